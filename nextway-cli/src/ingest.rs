//! Ingest command implementation.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use nextway_core::RegionName;
use nextway_data::{FeedInput, IngestOptions, IngestReport, ingest};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_FEED, ARG_MAX_DEPTH, ARG_REGION, ARG_STORE_DIR, ARG_WORK_DIR, CliError, ENV_INGEST_FEED,
    ENV_INGEST_REGION, extract_depth, feed_input, runtime, write_report,
};

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Validate a feed directory or ZIP archive and load every \
                 collection into the SQLite store of a region. Options can \
                 come from CLI flags, configuration files, or environment \
                 variables.",
    about = "Load a feed into a region store"
)]
#[ortho_config(prefix = "NEXTWAY")]
pub(crate) struct IngestArgs {
    /// Feed directory or ZIP archive.
    #[arg(long = ARG_FEED, value_name = "path")]
    #[serde(default)]
    pub(crate) feed: Option<Utf8PathBuf>,
    /// Region whose store receives the feed.
    #[arg(long = ARG_REGION, value_name = "name")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Directory holding region stores (defaults to the current directory).
    #[arg(long = ARG_STORE_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) store_dir: Option<Utf8PathBuf>,
    /// Directory that gets an `nwt-work` scratch area (defaults to a temporary one).
    #[arg(long = ARG_WORK_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) work_dir: Option<Utf8PathBuf>,
    /// Levels of nested archives to unpack; -1 unpacks every level.
    #[arg(long = ARG_MAX_DEPTH, value_name = "levels", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) max_depth: Option<i64>,
}

impl IngestArgs {
    pub(crate) fn into_config(self) -> Result<IngestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestConfig::try_from(merged)
    }
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct IngestConfig {
    pub(crate) feed: Utf8PathBuf,
    pub(crate) options: IngestOptions,
}

impl IngestConfig {
    pub(crate) fn input(&self) -> Result<FeedInput, CliError> {
        feed_input(self.feed.clone(), ARG_FEED)
    }
}

impl TryFrom<IngestArgs> for IngestConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let feed = args.feed.ok_or(CliError::MissingArgument {
            field: ARG_FEED,
            env: ENV_INGEST_FEED,
        })?;
        let region: RegionName = args
            .region
            .ok_or(CliError::MissingArgument {
                field: ARG_REGION,
                env: ENV_INGEST_REGION,
            })?
            .parse()?;
        let options = IngestOptions {
            region,
            store_dir: args.store_dir.unwrap_or_else(|| Utf8PathBuf::from(".")),
            work_dir: args.work_dir,
            max_depth: extract_depth(args.max_depth)?,
        };
        Ok(Self { feed, options })
    }
}

pub(crate) fn resolve_ingest_config(args: IngestArgs) -> Result<IngestConfig, CliError> {
    let config = args.into_config()?;
    config.input()?;
    Ok(config)
}

pub(crate) fn run_ingest_with(args: IngestArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = resolve_ingest_config(args)?;
    let report = execute_ingest(&config)?;
    write_report(writer, &report)
}

pub(crate) fn execute_ingest(config: &IngestConfig) -> Result<IngestReport, CliError> {
    let input = config.input()?;
    info!(
        "ingesting {} into region {} (max depth {})",
        config.feed, config.options.region, config.options.max_depth
    );
    let report = runtime()?.block_on(ingest(input, &config.options))?;
    Ok(report)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<IngestConfig, CliError> {
    let merged = IngestArgs::merge_from_layers(layers).map_err(CliError::from)?;
    IngestConfig::try_from(merged)
}
