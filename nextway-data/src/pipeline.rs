//! End-to-end ingestion: select a feed, validate it, load it into a region.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use nextway_core::{RegionName, ValidationFailure, gtfs_catalogue};
use nextway_fs::WorkingStore;
use serde::Serialize;
use thiserror::Error;

use crate::{
    DirectorySource, ExtractDepth, ExtractError, ExtractReport, FeedSource, FeedStore, LoadError,
    LoadReport, LocateError, StoreError, UploadedFiles, extract, load, locate_feed_root,
    validate_source,
};

/// Subdirectory of a caller-supplied work directory that the working store
/// owns. Only this subdirectory is ever reset.
pub const SCRATCH_DIR: &str = "nwt-work";

/// Where the feed comes from.
#[derive(Debug, Clone)]
pub enum FeedInput {
    /// A directory already holding the feed files.
    Directory(Utf8PathBuf),
    /// A ZIP archive, possibly with nested archives inside.
    Archive(Utf8PathBuf),
    /// Files handed over in memory.
    Uploads(UploadedFiles),
}

/// Settings for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Region whose store receives the feed.
    pub region: RegionName,
    /// Directory holding the region stores.
    pub store_dir: Utf8PathBuf,
    /// Directory whose [`SCRATCH_DIR`] holds archives and uploads; a temporary
    /// one when unset.
    pub work_dir: Option<Utf8PathBuf>,
    /// Nested archive depth.
    pub max_depth: ExtractDepth,
}

/// Errors that stop an ingestion run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IngestError {
    /// The archive could not be unpacked.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The input directory could not be read.
    #[error("failed to read feed directory {path}")]
    Source {
        /// Directory as given.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The scratch directory could not be prepared or read.
    #[error("failed to prepare the working store")]
    WorkingStore(#[source] io::Error),
    /// The store directory lies inside the scratch area and would be wiped.
    #[error("store directory {store_dir} lies inside the working store {scratch}")]
    StoreInsideWorkingStore {
        /// Store directory as given.
        store_dir: Utf8PathBuf,
        /// Scratch area that would be reset.
        scratch: Utf8PathBuf,
    },
    /// The files do not form a usable feed.
    #[error("feed rejected: {0}")]
    ValidationFailed(ValidationFailure),
    /// The region store could not be opened.
    #[error("feed store unavailable")]
    StoreUnavailable(#[from] StoreError),
    /// One or more collections failed to load.
    #[error(transparent)]
    LoadFailed(#[from] LoadError),
}

impl From<LocateError> for IngestError {
    fn from(err: LocateError) -> Self {
        match err {
            LocateError::Invalid(failure) => Self::ValidationFailed(failure),
            LocateError::Io(source) => Self::WorkingStore(source),
        }
    }
}

/// A validated feed ready to be loaded.
///
/// Holds on to the working store, if any, so extracted files outlive
/// validation.
#[derive(Debug)]
pub struct PreparedFeed {
    source: DirectorySource,
    extraction: Option<ExtractReport>,
    _store: Option<WorkingStore>,
}

impl PreparedFeed {
    /// Directory the feed files are read from.
    #[must_use]
    pub fn feed_root(&self) -> &Utf8Path {
        self.source.label()
    }

    /// Extraction report, when the input was an archive.
    #[must_use]
    pub const fn extraction(&self) -> Option<&ExtractReport> {
        self.extraction.as_ref()
    }

    /// Top-level file names at the feed root.
    ///
    /// # Errors
    /// Propagates I/O errors from listing the feed root.
    pub fn file_names(&self) -> io::Result<Vec<String>> {
        self.source.file_names()
    }
}

/// Stage `input`, unpack it if needed, and check that it forms a feed.
///
/// Directories are validated in place. Archives and uploads go through a
/// working store at `work_dir/`[`SCRATCH_DIR`], or a temporary one, and the
/// feed root is searched for inside it. Nothing else under `work_dir` is
/// touched.
///
/// # Errors
/// Returns [`IngestError::ValidationFailed`] when no usable feed is found and
/// the extraction or I/O error otherwise.
pub async fn prepare(
    input: FeedInput,
    work_dir: Option<&Utf8Path>,
    max_depth: ExtractDepth,
) -> Result<PreparedFeed, IngestError> {
    match input {
        FeedInput::Directory(path) => {
            let source =
                DirectorySource::open_path(&path).map_err(|source| IngestError::Source {
                    path: path.clone(),
                    source,
                })?;
            let verdict = validate_source(&source)
                .map_err(|source| IngestError::Source { path, source })?;
            if let Some(failure) = verdict {
                return Err(IngestError::ValidationFailed(failure));
            }
            Ok(PreparedFeed {
                source,
                extraction: None,
                _store: None,
            })
        }
        FeedInput::Archive(archive) => {
            let mut store = open_working_store(work_dir)?;
            let report = extract(&archive, max_depth, &mut store).await?;
            info!(
                "extracted {} files from {archive} ({} nested archives)",
                report.files.len(),
                report.nested_archives.len()
            );
            finish_staged(store, Some(report))
        }
        FeedInput::Uploads(uploads) => {
            let mut store = open_working_store(work_dir)?;
            uploads.stage(&mut store).map_err(IngestError::WorkingStore)?;
            finish_staged(store, None)
        }
    }
}

fn open_working_store(work_dir: Option<&Utf8Path>) -> Result<WorkingStore, IngestError> {
    match work_dir {
        Some(dir) => WorkingStore::open(&dir.join(SCRATCH_DIR)),
        None => WorkingStore::temporary(),
    }
    .map_err(IngestError::WorkingStore)
}

/// Refuse a store directory the working store would reset.
///
/// The comparison is lexical on the paths as given.
fn check_store_outside_scratch(options: &IngestOptions) -> Result<(), IngestError> {
    let Some(work_dir) = options.work_dir.as_deref() else {
        return Ok(());
    };
    let scratch = work_dir.join(SCRATCH_DIR);
    if options.store_dir.starts_with(&scratch) {
        return Err(IngestError::StoreInsideWorkingStore {
            store_dir: options.store_dir.clone(),
            scratch,
        });
    }
    Ok(())
}

fn finish_staged(
    store: WorkingStore,
    extraction: Option<ExtractReport>,
) -> Result<PreparedFeed, IngestError> {
    let relative = locate_feed_root(&store)?;
    let source =
        DirectorySource::in_store(&store, &relative).map_err(IngestError::WorkingStore)?;
    Ok(PreparedFeed {
        source,
        extraction,
        _store: Some(store),
    })
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Region that received the feed.
    pub region: String,
    /// Store file written.
    pub store: Utf8PathBuf,
    /// Directory the feed was read from.
    pub feed_root: Utf8PathBuf,
    /// Extraction report, when the input was an archive.
    pub extraction: Option<ExtractReport>,
    /// Collections committed.
    pub load: LoadReport,
}

/// Validate `input` and load it into the store of `options.region`.
///
/// The store is opened only after the feed passes validation, so rejected
/// input never touches it. The returned future is not `Send`; drive it with
/// `block_on` or a local task.
///
/// # Errors
/// Returns the first [`IngestError`] that stops the run.
pub async fn ingest(
    input: FeedInput,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    check_store_outside_scratch(options)?;
    let prepared = prepare(input, options.work_dir.as_deref(), options.max_depth).await?;
    let store = FeedStore::open_region(&options.store_dir, &options.region, gtfs_catalogue())?;
    info!(
        "loading feed from {} into {}",
        prepared.feed_root(),
        store.path()
    );
    let feed_root = prepared.feed_root().to_path_buf();
    let PreparedFeed {
        source,
        extraction,
        _store: scratch,
    } = prepared;
    let report = load(source, &store).await?;
    drop(scratch);
    Ok(IngestReport {
        region: options.region.as_str().to_owned(),
        store: store.path().to_path_buf(),
        feed_root,
        extraction,
        load: report,
    })
}
