//! Recursive ZIP extraction into a [`WorkingStore`].
//!
//! Archive payloads are decoded on blocking tasks, one task per container, and
//! every file they yield is written by its own task. Writes start once every
//! container has been scanned, so a path yielded more than once holds the
//! payload absorbed last. The coordinator joins the whole task set before
//! returning, so a failing unit never leaves siblings running behind the
//! caller's back.

use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Cursor, Read},
    sync::Arc,
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use log::{debug, info, warn};
use nextway_fs::{WorkingStore, read_file, sanitise_relative, write_relative};
use serde::Serialize;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use zip::{ZipArchive, result::ZipError};

/// How many levels of nested archives are unpacked.
///
/// The outermost archive is level 0 and is always unpacked. `Limited(k)`
/// unpacks archives found at levels `0..k`, so levels `0..=k` end up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractDepth {
    /// Unpack nested archives up to this many levels below the outermost one.
    Limited(u32),
    /// Unpack every nested archive.
    Unlimited,
}

impl ExtractDepth {
    /// Whether an archive found while scanning `level` is unpacked.
    #[must_use]
    pub const fn allows(self, level: u32) -> bool {
        match self {
            Self::Limited(max) => level < max,
            Self::Unlimited => true,
        }
    }
}

impl Default for ExtractDepth {
    fn default() -> Self {
        Self::Limited(0)
    }
}

impl fmt::Display for ExtractDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{max}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Depth value outside `-1..=u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("extraction depth must be -1 (unlimited) or a non-negative level, got {value}")]
pub struct InvalidDepth {
    /// Rejected value.
    pub value: i64,
}

impl TryFrom<i64> for ExtractDepth {
    type Error = InvalidDepth;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == -1 {
            return Ok(Self::Unlimited);
        }
        u32::try_from(value)
            .map(Self::Limited)
            .map_err(|_| InvalidDepth { value })
    }
}

/// What an extraction run put into the working store.
///
/// Paths are relative to the store root and sorted as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Tabular files written.
    pub files: Vec<Utf8PathBuf>,
    /// Nested archives that were unpacked.
    pub nested_archives: Vec<Utf8PathBuf>,
    /// Nested archives left alone because the depth limit was reached.
    pub skipped_archives: Vec<Utf8PathBuf>,
    /// Entries dropped for their extension.
    pub discarded: Vec<Utf8PathBuf>,
    /// Paths yielded more than once; the later payload replaced the earlier.
    pub replaced: Vec<Utf8PathBuf>,
    /// Raw entry names that would have escaped the store.
    pub rejected: Vec<String>,
}

impl ExtractReport {
    fn sort(&mut self) {
        for paths in [
            &mut self.files,
            &mut self.nested_archives,
            &mut self.skipped_archives,
            &mut self.discarded,
            &mut self.replaced,
        ] {
            paths.sort_by(|lhs, rhs| lhs.as_str().cmp(rhs.as_str()));
        }
        self.rejected.sort();
    }
}

/// Errors raised while extracting an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The outermost archive could not be read from disk.
    #[error("failed to read archive {archive}")]
    Open {
        /// Archive path as given.
        archive: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A container could not be decoded.
    #[error("archive {archive} is corrupt or not a ZIP file")]
    ArchiveCorrupt {
        /// Outermost archive path, or the store-relative path of a nested one.
        archive: Utf8PathBuf,
        /// Decoder error.
        #[source]
        source: ZipError,
    },
    /// The working store could not be emptied before extraction.
    #[error("failed to reset working store at {root}")]
    Reset {
        /// Store root.
        root: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A file could not be written into the working store.
    #[error("failed to write {path} into the working store")]
    Write {
        /// Store-relative path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// An extraction task panicked or was cancelled.
    #[error("extraction task did not complete")]
    Task {
        /// Join failure.
        #[source]
        source: JoinError,
    },
}

/// Reset `store` and unpack the archive at `archive` into it.
///
/// # Errors
/// Returns [`ExtractError`] once every dispatched unit has settled; the first
/// failure wins and later ones are logged.
pub async fn extract(
    archive: &Utf8Path,
    depth: ExtractDepth,
    store: &mut WorkingStore,
) -> Result<ExtractReport, ExtractError> {
    let bytes = read_file(archive).map_err(|source| ExtractError::Open {
        archive: archive.to_path_buf(),
        source,
    })?;
    extract_bytes(archive, bytes, depth, store).await
}

/// Reset `store` and unpack an in-memory archive into it.
///
/// `label` names the archive in errors and logs.
///
/// # Errors
/// As for [`extract`].
pub async fn extract_bytes(
    label: &Utf8Path,
    bytes: Vec<u8>,
    depth: ExtractDepth,
    store: &mut WorkingStore,
) -> Result<ExtractReport, ExtractError> {
    let root = store.root().to_path_buf();
    let reset_failed = |source| ExtractError::Reset {
        root: root.clone(),
        source,
    };
    store.reset().map_err(reset_failed)?;
    let dir = store.try_clone_dir().map_err(reset_failed)?;

    let mut run = Extraction::new(depth, dir);
    run.dispatch_scan(label.to_path_buf(), Utf8PathBuf::new(), 0, bytes);
    let report = run.finish().await?;
    info!(
        "extracted {label} into {root}: {} files, {} nested archives, {} skipped by depth",
        report.files.len(),
        report.nested_archives.len(),
        report.skipped_archives.len()
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Tabular,
    Archive,
    Other,
}

fn classify(path: &Utf8Path) -> EntryKind {
    match path.extension().map(str::to_ascii_lowercase).as_deref() {
        Some("txt" | "geojson") => EntryKind::Tabular,
        Some("zip") => EntryKind::Archive,
        _ => EntryKind::Other,
    }
}

#[derive(Debug)]
enum ScannedEntry {
    Tabular(Vec<u8>),
    Archive(Vec<u8>),
}

#[derive(Debug, Default)]
struct Scan {
    prefix: Utf8PathBuf,
    level: u32,
    payloads: BTreeMap<Utf8PathBuf, ScannedEntry>,
    discarded: Vec<Utf8PathBuf>,
    replaced: Vec<Utf8PathBuf>,
    rejected: Vec<String>,
}

#[derive(Debug)]
enum Settled {
    Scanned(Scan),
    Written(Utf8PathBuf),
}

type Unit = Result<Settled, ExtractError>;

struct Extraction {
    depth: ExtractDepth,
    dir: Arc<fs_utf8::Dir>,
    tasks: JoinSet<Unit>,
    pending: BTreeMap<Utf8PathBuf, Vec<u8>>,
    first_error: Option<ExtractError>,
    report: ExtractReport,
}

impl Extraction {
    fn new(depth: ExtractDepth, dir: fs_utf8::Dir) -> Self {
        Self {
            depth,
            dir: Arc::new(dir),
            tasks: JoinSet::new(),
            pending: BTreeMap::new(),
            first_error: None,
            report: ExtractReport::default(),
        }
    }

    fn dispatch_scan(
        &mut self,
        archive: Utf8PathBuf,
        prefix: Utf8PathBuf,
        level: u32,
        bytes: Vec<u8>,
    ) {
        debug!("dispatching scan of {archive} at level {level}");
        self.tasks.spawn_blocking(move || {
            let mut scan = scan_archive(&archive, bytes)?;
            scan.prefix = prefix;
            scan.level = level;
            Ok(Settled::Scanned(scan))
        });
    }

    fn dispatch_write(&mut self, path: Utf8PathBuf, contents: Vec<u8>) {
        let dir = Arc::clone(&self.dir);
        self.tasks
            .spawn_blocking(move || match write_relative(&dir, &path, &contents) {
                Ok(()) => Ok(Settled::Written(path)),
                Err(source) => Err(ExtractError::Write { path, source }),
            });
    }

    fn absorb(&mut self, scan: Scan) {
        let Scan {
            prefix,
            level,
            payloads,
            discarded,
            replaced,
            rejected,
        } = scan;
        for (path, entry) in payloads {
            let target = prefix.join(&path);
            match entry {
                ScannedEntry::Tabular(contents) => {
                    if self.pending.insert(target.clone(), contents).is_some() {
                        warn!("{target} was extracted more than once; the later payload wins");
                        self.report.replaced.push(target);
                    }
                }
                ScannedEntry::Archive(contents) if self.depth.allows(level) => {
                    let nested = target.with_extension("");
                    self.report.nested_archives.push(target.clone());
                    self.dispatch_scan(target, nested, level + 1, contents);
                }
                ScannedEntry::Archive(_) => {
                    debug!(
                        "leaving {target} packed at level {level} (depth {})",
                        self.depth
                    );
                    self.report.skipped_archives.push(target);
                }
            }
        }
        self.report
            .discarded
            .extend(discarded.into_iter().map(|path| prefix.join(path)));
        self.report
            .replaced
            .extend(replaced.into_iter().map(|path| prefix.join(path)));
        for name in rejected {
            warn!("skipping archive entry {name:?}: path escapes the working store");
            self.report.rejected.push(name);
        }
    }

    async fn settle(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            let unit = joined
                .map_err(|source| ExtractError::Task { source })
                .and_then(|unit| unit);
            match unit {
                Ok(Settled::Scanned(scan)) => self.absorb(scan),
                Ok(Settled::Written(path)) => self.report.files.push(path),
                Err(err) if self.first_error.is_none() => self.first_error = Some(err),
                Err(err) => warn!("additional extraction failure: {err}"),
            }
        }
    }

    async fn finish(mut self) -> Result<ExtractReport, ExtractError> {
        self.settle().await;
        for (path, contents) in std::mem::take(&mut self.pending) {
            self.dispatch_write(path, contents);
        }
        self.settle().await;
        if let Some(err) = self.first_error {
            return Err(err);
        }
        self.report.sort();
        Ok(self.report)
    }
}

fn scan_archive(archive: &Utf8Path, bytes: Vec<u8>) -> Result<Scan, ExtractError> {
    let corrupt = |source| ExtractError::ArchiveCorrupt {
        archive: archive.to_path_buf(),
        source,
    };
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
    let mut scan = Scan::default();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(corrupt)?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry
            .enclosed_name()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .and_then(|path| sanitise_relative(&path))
        else {
            scan.rejected.push(entry.name().to_owned());
            continue;
        };
        let kind = classify(&path);
        if kind == EntryKind::Other {
            scan.discarded.push(path);
            continue;
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| corrupt(ZipError::Io(err)))?;
        let payload = if kind == EntryKind::Archive {
            ScannedEntry::Archive(contents)
        } else {
            ScannedEntry::Tabular(contents)
        };
        if scan.payloads.insert(path.clone(), payload).is_some() {
            debug!("{archive} repeats {path}; the later entry wins");
            scan.replaced.push(path);
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests;
