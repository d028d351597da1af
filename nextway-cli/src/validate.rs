//! Validate command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use nextway_data::{ExtractDepth, ExtractReport, prepare};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_FEED, ARG_MAX_DEPTH, ARG_WORK_DIR, CliError, ENV_VALIDATE_FEED, extract_depth, feed_input,
    runtime, write_report,
};

/// CLI arguments for the `validate` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Unpack a feed archive if needed, locate the feed inside it \
                 and check that the required files are present. Nothing is \
                 written to a region store.",
    about = "Check that a feed is usable"
)]
#[ortho_config(prefix = "NEXTWAY")]
pub(crate) struct ValidateArgs {
    /// Feed directory or ZIP archive.
    #[arg(long = ARG_FEED, value_name = "path")]
    #[serde(default)]
    pub(crate) feed: Option<Utf8PathBuf>,
    /// Directory that gets an `nwt-work` scratch area (defaults to a temporary one).
    #[arg(long = ARG_WORK_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) work_dir: Option<Utf8PathBuf>,
    /// Levels of nested archives to unpack; -1 unpacks every level.
    #[arg(long = ARG_MAX_DEPTH, value_name = "levels", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_depth: Option<i64>,
}

/// Resolved `validate` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidateConfig {
    pub(crate) feed: Utf8PathBuf,
    pub(crate) work_dir: Option<Utf8PathBuf>,
    pub(crate) max_depth: ExtractDepth,
}

impl TryFrom<ValidateArgs> for ValidateConfig {
    type Error = CliError;

    fn try_from(args: ValidateArgs) -> Result<Self, Self::Error> {
        let feed = args.feed.ok_or(CliError::MissingArgument {
            field: ARG_FEED,
            env: ENV_VALIDATE_FEED,
        })?;
        Ok(Self {
            feed,
            work_dir: args.work_dir,
            max_depth: extract_depth(args.max_depth)?,
        })
    }
}

/// Outcome printed by `validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ValidateReport {
    /// Directory holding the feed.
    pub(crate) feed_root: Utf8PathBuf,
    /// Files at the feed root.
    pub(crate) files: Vec<String>,
    /// Extraction report, when the feed was an archive.
    pub(crate) extraction: Option<ExtractReport>,
}

pub(crate) fn run_validate_with(
    args: ValidateArgs,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let config = ValidateConfig::try_from(merged)?;
    let report = execute_validate(&config)?;
    write_report(writer, &report)
}

pub(crate) fn execute_validate(config: &ValidateConfig) -> Result<ValidateReport, CliError> {
    let input = feed_input(config.feed.clone(), ARG_FEED)?;
    let prepared =
        runtime()?.block_on(prepare(input, config.work_dir.as_deref(), config.max_depth))?;
    let files = prepared
        .file_names()
        .map_err(|source| CliError::ListFeed {
            path: prepared.feed_root().to_path_buf(),
            source,
        })?;
    Ok(ValidateReport {
        feed_root: prepared.feed_root().to_path_buf(),
        files,
        extraction: prepared.extraction().cloned(),
    })
}
