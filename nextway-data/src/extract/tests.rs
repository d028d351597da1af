//! Unit tests for recursive archive extraction.

use super::*;
use crate::test_support::{Sandbox, zip_bytes};
use rstest::{fixture, rstest};

#[fixture]
fn sandbox() -> Sandbox {
    Sandbox::new()
}

fn nested_chain() -> Vec<u8> {
    let innermost = zip_bytes(&[("l2.txt", b"level,2\n")]);
    let middle = zip_bytes(&[("l1.txt", b"level,1\n"), ("n2.zip", &innermost)]);
    zip_bytes(&[("l0.txt", b"level,0\n"), ("n1.zip", &middle)])
}

fn strings(paths: &[Utf8PathBuf]) -> Vec<&str> {
    paths.iter().map(|path| path.as_str()).collect()
}

#[rstest]
#[tokio::test]
async fn writes_tabular_files_and_discards_the_rest(mut sandbox: Sandbox) {
    let archive = zip_bytes(&[
        ("feed/", b""),
        ("feed/agency.txt", b"agency_id\nA1\n"),
        ("feed/Locations.GEOJSON", b"{}"),
        ("feed/README.md", b"# notes"),
        ("logo.png", b"\x89PNG"),
    ]);
    let report = extract_bytes(
        Utf8Path::new("feed.zip"),
        archive,
        ExtractDepth::default(),
        &mut sandbox.store,
    )
    .await
    .expect("extract archive");

    assert_eq!(
        strings(&report.files),
        vec!["feed/Locations.GEOJSON", "feed/agency.txt"]
    );
    assert_eq!(strings(&report.discarded), vec!["feed/README.md", "logo.png"]);
    assert_eq!(sandbox.files(), vec!["feed/Locations.GEOJSON", "feed/agency.txt"]);
    let contents = sandbox
        .store
        .dir()
        .read("feed/agency.txt")
        .expect("read extracted file");
    assert_eq!(contents, b"agency_id\nA1\n");
}

#[rstest]
#[tokio::test]
async fn extraction_resets_previous_contents(mut sandbox: Sandbox) {
    sandbox
        .store
        .write_file(Utf8Path::new("stale/old.txt"), b"left over")
        .expect("seed stale file");
    let archive = zip_bytes(&[("stops.txt", b"stop_id\nS1\n")]);

    let label = Utf8Path::new("a.zip");

    let first = extract_bytes(label, archive.clone(), ExtractDepth::default(), &mut sandbox.store)
        .await
        .expect("first extraction");
    let after_first = sandbox.files();
    let second = extract_bytes(label, archive, ExtractDepth::default(), &mut sandbox.store)
        .await
        .expect("second extraction");

    assert_eq!(after_first, vec!["stops.txt"]);
    assert_eq!(sandbox.files(), after_first);
    assert_eq!(first, second);
}

#[rstest]
#[case::outer_only(
    ExtractDepth::Limited(0),
    &["l0.txt"],
    &[],
    &["n1.zip"],
)]
#[case::one_level(
    ExtractDepth::Limited(1),
    &["l0.txt", "n1/l1.txt"],
    &["n1.zip"],
    &["n1/n2.zip"],
)]
#[case::unlimited(
    ExtractDepth::Unlimited,
    &["l0.txt", "n1/l1.txt", "n1/n2/l2.txt"],
    &["n1.zip", "n1/n2.zip"],
    &[],
)]
#[tokio::test]
async fn nested_archives_follow_the_depth_limit(
    mut sandbox: Sandbox,
    #[case] depth: ExtractDepth,
    #[case] files: &[&str],
    #[case] nested: &[&str],
    #[case] skipped: &[&str],
) {
    let report = extract_bytes(
        Utf8Path::new("chain.zip"),
        nested_chain(),
        depth,
        &mut sandbox.store,
    )
    .await
    .expect("extract nested chain");

    assert_eq!(strings(&report.files), files);
    assert_eq!(strings(&report.nested_archives), nested);
    assert_eq!(strings(&report.skipped_archives), skipped);
    assert_eq!(sandbox.files(), files);
}

#[rstest]
#[tokio::test]
async fn entries_escaping_the_store_are_skipped(mut sandbox: Sandbox) {
    let archive = zip_bytes(&[
        ("../escape.txt", b"nope"),
        ("agency.txt", b"agency_id\n"),
    ]);
    let report = extract_bytes(
        Utf8Path::new("slip.zip"),
        archive,
        ExtractDepth::default(),
        &mut sandbox.store,
    )
    .await
    .expect("extraction succeeds without the bad entry");

    assert_eq!(report.rejected, vec!["../escape.txt".to_owned()]);
    assert_eq!(sandbox.files(), vec!["agency.txt"]);
    assert!(!sandbox.parent_path().join("escape.txt").as_std_path().exists());
}

#[rstest]
#[tokio::test]
async fn corrupt_archive_is_reported(mut sandbox: Sandbox) {
    let err = extract_bytes(
        Utf8Path::new("broken.zip"),
        b"definitely not a zip".to_vec(),
        ExtractDepth::default(),
        &mut sandbox.store,
    )
    .await
    .expect_err("corrupt archive should fail");

    match err {
        ExtractError::ArchiveCorrupt { archive, .. } => assert_eq!(archive, "broken.zip"),
        other => panic!("expected corrupt archive, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn corrupt_nested_archive_fails_after_siblings_settle(mut sandbox: Sandbox) {
    let archive = zip_bytes(&[
        ("agency.txt", b"agency_id\nA1\n"),
        ("inner.zip", b"garbage"),
        ("routes.txt", b"route_id\nR1\n"),
    ]);
    let err = extract_bytes(
        Utf8Path::new("outer.zip"),
        archive,
        ExtractDepth::Unlimited,
        &mut sandbox.store,
    )
    .await
    .expect_err("nested corruption should fail the run");

    match err {
        ExtractError::ArchiveCorrupt { archive, .. } => assert_eq!(archive, "inner.zip"),
        other => panic!("expected corrupt nested archive, got {other:?}"),
    }
    assert_eq!(sandbox.files(), vec!["agency.txt", "routes.txt"]);
}

#[rstest]
#[tokio::test]
async fn nested_archive_overwrites_paths_of_its_enclosing_archive(mut sandbox: Sandbox) {
    let inner = zip_bytes(&[("stops.txt", b"from inner\n")]);
    let archive = zip_bytes(&[
        ("feed/stops.txt", b"from outer\n"),
        ("feed.zip", &inner),
    ]);
    let report = extract_bytes(
        Utf8Path::new("outer.zip"),
        archive,
        ExtractDepth::Unlimited,
        &mut sandbox.store,
    )
    .await
    .expect("extract overlapping archives");

    assert_eq!(strings(&report.files), vec!["feed/stops.txt"]);
    assert_eq!(strings(&report.replaced), vec!["feed/stops.txt"]);
    assert!(report.discarded.is_empty());
    let contents = sandbox
        .store
        .dir()
        .read("feed/stops.txt")
        .expect("read overwritten file");
    assert_eq!(contents, b"from inner\n");
}

#[rstest]
#[tokio::test]
async fn deeper_archives_win_at_every_level(mut sandbox: Sandbox) {
    let innermost = zip_bytes(&[("agency.txt", b"level 2\n")]);
    let middle = zip_bytes(&[("agency.txt", b"level 1\n"), ("x.zip", &innermost)]);
    let archive = zip_bytes(&[
        ("x/x/agency.txt", b"level 0\n"),
        ("x/agency.txt", b"level 0\n"),
        ("x.zip", &middle),
    ]);
    let report = extract_bytes(
        Utf8Path::new("layers.zip"),
        archive,
        ExtractDepth::Unlimited,
        &mut sandbox.store,
    )
    .await
    .expect("extract layered archives");

    assert_eq!(
        strings(&report.replaced),
        vec!["x/agency.txt", "x/x/agency.txt"]
    );
    let read = |path: &str| sandbox.store.dir().read(path).expect("read extracted file");
    assert_eq!(read("x/agency.txt"), b"level 1\n");
    assert_eq!(read("x/x/agency.txt"), b"level 2\n");
}

#[rstest]
#[tokio::test]
async fn missing_archive_is_an_open_error(mut sandbox: Sandbox) {
    let missing = sandbox.parent_path().join("missing.zip");
    let err = extract(&missing, ExtractDepth::default(), &mut sandbox.store)
        .await
        .expect_err("missing archive should fail");
    assert!(
        matches!(err, ExtractError::Open { .. }),
        "unexpected error: {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn extracts_archives_from_disk(mut sandbox: Sandbox) {
    let path = sandbox.parent_path().join("feed.zip");
    std::fs::write(&path, zip_bytes(&[("trips.txt", b"trip_id\nT1\n")]))
        .expect("write archive");
    let report = extract(&path, ExtractDepth::default(), &mut sandbox.store)
        .await
        .expect("extract from disk");
    assert_eq!(strings(&report.files), vec!["trips.txt"]);
}

#[rstest]
#[case(-1, Ok(ExtractDepth::Unlimited))]
#[case(0, Ok(ExtractDepth::Limited(0)))]
#[case(3, Ok(ExtractDepth::Limited(3)))]
#[case(-2, Err(InvalidDepth { value: -2 }))]
fn depth_parses_signed_levels(
    #[case] raw: i64,
    #[case] expected: Result<ExtractDepth, InvalidDepth>,
) {
    assert_eq!(ExtractDepth::try_from(raw), expected);
}

#[rstest]
fn depth_allows_levels_below_the_limit() {
    assert!(!ExtractDepth::Limited(0).allows(0));
    assert!(ExtractDepth::Limited(2).allows(1));
    assert!(!ExtractDepth::Limited(2).allows(2));
    assert!(ExtractDepth::Unlimited.allows(u32::MAX));
    assert_eq!(ExtractDepth::Unlimited.to_string(), "unlimited");
}
