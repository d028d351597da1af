//! Finding the directory inside a working store that holds a usable feed.

use std::io;

use camino::Utf8PathBuf;
use log::debug;
use nextway_core::{ValidationFailure, validate_feed};
use nextway_fs::{WorkingStore, list_dirs_breadth_first, list_top_level_files};
use thiserror::Error;

use crate::FeedSource;

/// Run the feed presence rules over the top-level files of `source`.
///
/// # Errors
/// Propagates I/O errors from listing the source.
pub fn validate_source(source: &dyn FeedSource) -> io::Result<Option<ValidationFailure>> {
    Ok(validate_feed(source.file_names()?))
}

/// Why no feed root could be located.
#[derive(Debug, Error)]
pub enum LocateError {
    /// No directory passed validation; carries the root's failure.
    #[error(transparent)]
    Invalid(ValidationFailure),
    /// The store could not be listed.
    #[error("failed to list the working store")]
    Io(#[from] io::Error),
}

/// Locate the directory that holds the feed after extraction.
///
/// The store root is tried first, then every subdirectory breadth-first with
/// siblings in name order. Returns the store-relative path of the first
/// directory whose files pass validation; an empty path means the root.
///
/// # Errors
/// Returns [`LocateError::Invalid`] with the root's failure when no directory
/// passes.
pub fn locate_feed_root(store: &WorkingStore) -> Result<Utf8PathBuf, LocateError> {
    let Some(root_failure) = validate_feed(list_top_level_files(store.dir())?) else {
        return Ok(Utf8PathBuf::new());
    };
    debug!("store root is not a feed ({root_failure}); searching subdirectories");
    for candidate in list_dirs_breadth_first(store.dir())? {
        let dir = store.dir().open_dir(&candidate)?;
        match validate_feed(list_top_level_files(&dir)?) {
            None => {
                debug!("found feed root at {candidate}");
                return Ok(candidate);
            }
            Some(failure) => debug!("{candidate} is not a feed ({failure})"),
        }
    }
    Err(LocateError::Invalid(root_failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        UploadedFiles,
        test_support::{Sandbox, minimal_feed},
    };
    use camino::Utf8Path;
    use nextway_core::{FailureCategory, FeedFile};
    use rstest::rstest;

    fn write_feed(sandbox: &mut Sandbox, prefix: &str) {
        for (name, contents) in minimal_feed() {
            sandbox
                .store
                .write_file(&Utf8Path::new(prefix).join(name), &contents)
                .expect("write feed file");
        }
    }

    #[rstest]
    fn root_feed_wins() {
        let mut sandbox = Sandbox::new();
        write_feed(&mut sandbox, "");
        write_feed(&mut sandbox, "copy");
        assert_eq!(locate_feed_root(&sandbox.store).expect("locate"), "");
    }

    #[rstest]
    fn shallowest_nested_feed_is_found() {
        let mut sandbox = Sandbox::new();
        write_feed(&mut sandbox, "b/deeper");
        write_feed(&mut sandbox, "c");
        sandbox
            .store
            .write_file(Utf8Path::new("a/agency.txt"), b"agency_id\n")
            .expect("write partial feed");
        assert_eq!(locate_feed_root(&sandbox.store).expect("locate"), "c");
    }

    #[rstest]
    fn root_failure_is_reported_when_nothing_passes() {
        let mut sandbox = Sandbox::new();
        sandbox
            .store
            .write_file(Utf8Path::new("nested/routes.txt"), b"route_id\n")
            .expect("write partial feed");
        match locate_feed_root(&sandbox.store) {
            Err(LocateError::Invalid(failure)) => {
                assert_eq!(failure.category, FailureCategory::MissingCore);
                assert_eq!(failure.file, FeedFile::Agency);
            }
            other => panic!("expected a validation failure, got {other:?}"),
        }
    }

    #[rstest]
    fn validates_any_source() {
        let mut uploads: UploadedFiles = minimal_feed().into_iter().collect();
        assert_eq!(validate_source(&uploads).expect("list uploads"), None);
        uploads = UploadedFiles::from_iter([("stops.txt", Vec::new())]);
        let failure = validate_source(&uploads)
            .expect("list uploads")
            .expect("incomplete feed");
        assert_eq!(failure.file, FeedFile::Agency);
    }
}
