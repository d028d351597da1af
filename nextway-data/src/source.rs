//! Read access to the files of a feed, wherever they live.

use std::{
    io::{self, Cursor, Read},
    sync::Arc,
};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use log::debug;
use nextway_fs::{WorkingStore, list_top_level_files, open_ambient_dir};

/// Boxed reader handed to loader tasks.
pub type FeedReader = Box<dyn Read + Send>;

/// A set of named feed files.
///
/// Only top-level names matter: feed files never live in subdirectories of the
/// feed root.
pub trait FeedSource: Send + Sync {
    /// Names of the regular files at the top level, sorted.
    ///
    /// # Errors
    /// Propagates I/O errors from listing the source.
    fn file_names(&self) -> io::Result<Vec<String>>;

    /// Open `name` for reading, or `None` when the source has no such file.
    ///
    /// # Errors
    /// Propagates I/O errors other than the file being absent.
    fn open(&self, name: &str) -> io::Result<Option<FeedReader>>;
}

/// Feed files read from a directory capability.
#[derive(Debug)]
pub struct DirectorySource {
    label: Utf8PathBuf,
    dir: fs_utf8::Dir,
}

impl DirectorySource {
    /// Wrap an already opened directory; `label` is used in logs and reports.
    #[must_use]
    pub fn new(label: impl Into<Utf8PathBuf>, dir: fs_utf8::Dir) -> Self {
        Self {
            label: label.into(),
            dir,
        }
    }

    /// Open a directory on disk.
    ///
    /// # Errors
    /// Propagates the I/O error raised when the directory cannot be opened.
    pub fn open_path(path: &Utf8Path) -> io::Result<Self> {
        Ok(Self::new(path, open_ambient_dir(path)?))
    }

    /// Open `relative` inside a working store; an empty path means the root.
    ///
    /// # Errors
    /// Propagates the I/O error raised when the subdirectory cannot be opened.
    pub fn in_store(store: &WorkingStore, relative: &Utf8Path) -> io::Result<Self> {
        if relative.as_str().is_empty() {
            return Ok(Self::new(store.root(), store.dir().try_clone()?));
        }
        let dir = store.dir().open_dir(relative)?;
        Ok(Self::new(store.root().join(relative), dir))
    }

    /// Location the source was opened from.
    #[must_use]
    pub fn label(&self) -> &Utf8Path {
        &self.label
    }
}

impl FeedSource for DirectorySource {
    fn file_names(&self) -> io::Result<Vec<String>> {
        list_top_level_files(&self.dir)
    }

    fn open(&self, name: &str) -> io::Result<Option<FeedReader>> {
        match self.dir.open(name) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Files handed over directly, such as a browser upload.
///
/// # Examples
/// ```
/// use nextway_data::{FeedSource, UploadedFiles};
///
/// let uploads = UploadedFiles::from_iter([
///     ("stops.txt", b"stop_id\nS1\n".to_vec()),
///     ("agency.txt", b"agency_id\nA1\n".to_vec()),
/// ]);
/// assert_eq!(uploads.file_names()?, vec!["agency.txt", "stops.txt"]);
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles {
    files: Vec<(String, Arc<[u8]>)>,
}

impl UploadedFiles {
    /// Add a payload; a later file with the same name replaces the earlier one.
    pub fn push(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        let name = name.into();
        let contents: Arc<[u8]> = contents.into().into();
        match self.files.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = contents,
            None => self.files.push((name, contents)),
        }
    }

    /// Number of uploaded files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing was uploaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reset `store` and write every upload at its top level.
    ///
    /// Names carrying directory components keep only their final segment.
    ///
    /// # Errors
    /// Propagates I/O errors from resetting or writing the store.
    pub fn stage(&self, store: &mut WorkingStore) -> io::Result<()> {
        store.reset()?;
        for (name, contents) in &self.files {
            let Some(file_name) = Utf8Path::new(name).file_name() else {
                debug!("skipping upload without a file name: {name:?}");
                continue;
            };
            store.write_file(Utf8Path::new(file_name), contents)?;
        }
        debug!("staged {} uploaded files in {}", self.files.len(), store.root());
        Ok(())
    }
}

impl<N, C> FromIterator<(N, C)> for UploadedFiles
where
    N: Into<String>,
    C: Into<Vec<u8>>,
{
    fn from_iter<T: IntoIterator<Item = (N, C)>>(iter: T) -> Self {
        let mut uploads = Self::default();
        for (name, contents) in iter {
            uploads.push(name, contents);
        }
        uploads
    }
}

impl FeedSource for UploadedFiles {
    fn file_names(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = self.files.iter().map(|(name, _)| name.clone()).collect();
        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> io::Result<Option<FeedReader>> {
        Ok(self
            .files
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, contents)| Box::new(Cursor::new(Arc::clone(contents))) as FeedReader))
    }
}
