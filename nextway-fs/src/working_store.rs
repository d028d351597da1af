//! Sandboxed scratch area that archive extraction writes into.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use log::debug;
use tempfile::TempDir;

use crate::{SourceEntry, ensure_dir, list_files, open_ambient_dir, write_relative};

/// Exclusive scratch directory reached only through a directory capability.
///
/// Mutating operations take `&mut self`, so one extraction run owns the store
/// at a time. Readers borrow it shared once extraction has finished.
///
/// # Examples
/// ```
/// use camino::Utf8Path;
/// use nextway_fs::WorkingStore;
///
/// # fn main() -> std::io::Result<()> {
/// let mut store = WorkingStore::temporary()?;
/// store.write_file(Utf8Path::new("feed/agency.txt"), b"agency_id\nA1\n")?;
/// assert_eq!(store.files()?.len(), 1);
/// store.reset()?;
/// assert!(store.files()?.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WorkingStore {
    root: Utf8PathBuf,
    dir: fs_utf8::Dir,
    _temp: Option<TempDir>,
}

impl WorkingStore {
    /// Open (creating if needed) a working store rooted at `root`.
    ///
    /// Existing contents are kept until the next [`reset`](Self::reset).
    ///
    /// # Errors
    /// Propagates I/O errors from creating or opening the directory.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        ensure_dir(root)?;
        let dir = open_ambient_dir(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
            _temp: None,
        })
    }

    /// Create a working store in a fresh temporary directory removed on drop.
    ///
    /// # Errors
    /// Fails when the temporary directory cannot be created or is not UTF-8.
    pub fn temporary() -> io::Result<Self> {
        let temp = tempfile::Builder::new().prefix("nwt-").tempdir()?;
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|_| io::Error::other("temporary directory path is not UTF-8"))?;
        let dir = open_ambient_dir(&root)?;
        Ok(Self {
            root,
            dir,
            _temp: Some(temp),
        })
    }

    /// Location of the store on disk.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Directory capability for the store root.
    #[must_use]
    pub const fn dir(&self) -> &fs_utf8::Dir {
        &self.dir
    }

    /// Remove everything inside the store, recursively.
    ///
    /// The root directory itself survives so the capability stays valid.
    ///
    /// # Errors
    /// Propagates I/O errors from listing or removing entries.
    pub fn reset(&mut self) -> io::Result<()> {
        let mut removed = 0_usize;
        for entry in self.dir.entries()? {
            let entry = entry?;
            let name = entry.file_name()?;
            if entry.file_type()?.is_dir() {
                self.dir.remove_dir_all(&name)?;
            } else {
                self.dir.remove_file(&name)?;
            }
            removed += 1;
        }
        debug!("reset working store at {} ({removed} entries removed)", self.root);
        Ok(())
    }

    /// Write a file at `relative`, creating parent directories on demand.
    ///
    /// # Errors
    /// Rejects paths escaping the store and propagates I/O errors.
    pub fn write_file(&mut self, relative: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        write_relative(&self.dir, relative, contents)
    }

    /// Every regular file in the store, sorted by relative path.
    ///
    /// # Errors
    /// Propagates I/O errors from walking the tree.
    pub fn files(&self) -> io::Result<Vec<SourceEntry>> {
        list_files(&self.dir)
    }

    /// Independent handle to the store root for concurrent writers.
    ///
    /// # Errors
    /// Propagates the I/O error raised when duplicating the handle.
    pub fn try_clone_dir(&mut self) -> io::Result<fs_utf8::Dir> {
        self.dir.try_clone()
    }
}
