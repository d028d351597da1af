//! Focused unit tests covering CLI configuration and command execution.

use super::helpers::{Workspace, write_utf8};
use super::*;
use crate::{
    ingest::{IngestArgs, IngestConfig, config_from_layers_for_test, execute_ingest},
    validate::{ValidateConfig, execute_validate},
};
use nextway_core::{FailureCategory, FeedFile};
use nextway_data::IngestError;
use rstest::{fixture, rstest};

#[fixture]
fn workspace() -> Workspace {
    Workspace::new()
}

fn ingest_args(feed: Option<&str>, region: Option<&str>) -> IngestArgs {
    IngestArgs {
        feed: feed.map(Utf8PathBuf::from),
        region: region.map(str::to_owned),
        ..IngestArgs::default()
    }
}

#[rstest]
#[case(None, Some("victoria"), ARG_FEED, ENV_INGEST_FEED)]
#[case(Some("feed.zip"), None, ARG_REGION, ENV_INGEST_REGION)]
fn converting_without_required_fields_errors(
    #[case] feed: Option<&str>,
    #[case] region: Option<&str>,
    #[case] field: &'static str,
    #[case] env_var: &'static str,
) {
    let err = IngestConfig::try_from(ingest_args(feed, region))
        .expect_err("missing field should error");
    match err {
        CliError::MissingArgument {
            field: missing,
            env,
        } => {
            assert_eq!(missing, field);
            assert_eq!(env, env_var);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn converting_applies_defaults() {
    let config = IngestConfig::try_from(ingest_args(Some("feed.zip"), Some("victoria")))
        .expect("config should build");
    assert_eq!(config.options.store_dir, Utf8PathBuf::from("."));
    assert_eq!(config.options.work_dir, None);
    assert_eq!(config.options.max_depth, ExtractDepth::Limited(0));
    assert_eq!(config.options.region.as_str(), "victoria");
}

#[rstest]
fn converting_rejects_unusable_region_names() {
    let err = IngestConfig::try_from(ingest_args(Some("feed.zip"), Some("../victoria")))
        .expect_err("region with path separators should error");
    assert!(matches!(err, CliError::InvalidRegion(_)), "unexpected {err:?}");
}

#[rstest]
#[case(None, Ok(ExtractDepth::Limited(0)))]
#[case(Some(3), Ok(ExtractDepth::Limited(3)))]
#[case(Some(-1), Ok(ExtractDepth::Unlimited))]
#[case(Some(-2), Err(-2))]
fn depth_flag_maps_to_extract_depth(
    #[case] value: Option<i64>,
    #[case] expected: Result<ExtractDepth, i64>,
) {
    match (extract_depth(value), expected) {
        (Ok(depth), Ok(wanted)) => assert_eq!(depth, wanted),
        (Err(CliError::InvalidDepth(err)), Err(rejected)) => assert_eq!(err.value, rejected),
        (outcome, wanted) => panic!("expected {wanted:?}, found {outcome:?}"),
    }
}

#[rstest]
fn feed_input_classifies_paths(workspace: Workspace) {
    let directory = workspace.write_feed("feed", None);
    let archive = workspace.path("feed.zip");
    write_utf8(&archive, b"PK");

    assert!(matches!(
        feed_input(directory, ARG_FEED),
        Ok(FeedInput::Directory(_))
    ));
    assert!(matches!(
        feed_input(archive, ARG_FEED),
        Ok(FeedInput::Archive(_))
    ));
    match feed_input(workspace.path("absent"), ARG_FEED) {
        Err(CliError::MissingSourcePath { field, path }) => {
            assert_eq!(field, ARG_FEED);
            assert_eq!(path, workspace.path("absent"));
        }
        other => panic!("expected MissingSourcePath, found {other:?}"),
    }
}

#[rstest]
fn ingesting_a_directory_writes_the_region_store(workspace: Workspace) {
    let feed = workspace.write_feed("feed", None);
    let config = IngestConfig::try_from(IngestArgs {
        feed: Some(feed),
        region: Some("victoria".to_owned()),
        store_dir: Some(workspace.path("stores")),
        ..IngestArgs::default()
    })
    .expect("config should build");

    let report = execute_ingest(&config).expect("ingest should succeed");
    assert_eq!(
        report.store,
        workspace.path("stores").join("nwt-region-victoria.sqlite")
    );
    assert_eq!(report.load.records("stop_times"), Some(2));

    let mut output = Vec::new();
    write_report(&mut output, &report).expect("write report");
    let json: serde_json::Value = serde_json::from_slice(&output).expect("report is JSON");
    assert_eq!(json["region"], "victoria");
    assert_eq!(json["load"]["collections"][0]["collection"], "agencies");
}

#[rstest]
fn validating_reports_the_first_broken_rule(workspace: Workspace) {
    let feed = workspace.write_feed("feed", Some("agency.txt"));
    let config = ValidateConfig {
        feed,
        work_dir: None,
        max_depth: ExtractDepth::default(),
    };
    let err = execute_validate(&config).expect_err("feed without agency should fail");
    match err {
        CliError::Ingest(IngestError::ValidationFailed(failure)) => {
            assert_eq!(failure.category, FailureCategory::MissingCore);
            assert_eq!(failure.file, FeedFile::Agency);
        }
        other => panic!("expected a validation failure, found {other:?}"),
    }
}

#[rstest]
fn validating_lists_feed_files(workspace: Workspace) {
    let feed = workspace.write_feed("feed", None);
    let config = ValidateConfig {
        feed: feed.clone(),
        work_dir: None,
        max_depth: ExtractDepth::default(),
    };
    let report = execute_validate(&config).expect("feed should validate");
    assert_eq!(report.feed_root, feed);
    assert_eq!(report.files.len(), 6);
    assert!(report.extraction.is_none());
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "max_depth": "deep" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn merge_layers_honours_precedence(workspace: Workspace) {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let env_feed = workspace.path("from-env");
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({
            "region": "from-file",
            "store_dir": workspace.path("stores-from-file").as_str(),
            "max_depth": 2,
        }),
        None,
    );
    composer.push_environment(json!({
        "feed": env_feed.as_str(),
        "max_depth": -1,
    }));
    composer.push_cli(json!({ "region": "from-cli" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.feed, env_feed);
    assert_eq!(config.options.region.as_str(), "from-cli");
    assert_eq!(config.options.store_dir, workspace.path("stores-from-file"));
    assert_eq!(config.options.max_depth, ExtractDepth::Unlimited);
}
