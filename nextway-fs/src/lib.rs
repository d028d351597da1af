//! Capability-based filesystem helpers built on `cap-std` and `camino`.
//!
//! Everything the ingestion pipeline writes goes through a directory
//! capability, so paths taken from archives can never reach outside the
//! directory they were meant for.
#![forbid(unsafe_code)]

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::collections::VecDeque;
use std::io;
use std::path::Component;

mod working_store;

pub use working_store::WorkingStore;

/// Open a UTF-8 directory path using ambient authority.
///
/// # Errors
/// Propagates the I/O error raised when the directory cannot be opened.
pub fn open_ambient_dir(path: &Utf8Path) -> io::Result<fs_utf8::Dir> {
    fs_utf8::Dir::open_ambient_dir(path, ambient_authority())
}

/// Create `path` and any missing ancestors, handling absolute paths safely for cap-std.
///
/// # Errors
/// Propagates I/O errors from resolving the base directory or creating the tree.
pub fn ensure_dir(path: &Utf8Path) -> io::Result<()> {
    if path.as_os_str().is_empty() || path == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = base_dir_and_relative(path)?;
    if relative.as_os_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Ensure the parent directory for `path` exists.
///
/// # Errors
/// Propagates I/O errors from [`ensure_dir`].
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

/// Return whether a path exists and is a regular file using capability-based IO.
///
/// # Errors
/// Returns the I/O error raised when the parent directory or metadata cannot be read.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_and_name(path)?;
    dir.metadata(name).map(|meta| meta.is_file())
}

/// Read a whole file through a capability on its parent directory.
///
/// # Errors
/// Returns the I/O error raised when the parent directory or file cannot be read.
pub fn read_file(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (dir, name) = parent_and_name(path)?;
    dir.read(name)
}

fn parent_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, &str)> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let parent = if parent.as_os_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?;
    Ok((open_ambient_dir(parent)?, name))
}

/// Split an absolute or relative path into an ambient base directory and a relative suffix.
///
/// # Errors
/// Fails for non-UTF-8 prefixes or when the base directory cannot be opened.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();

    let (base, relative) = match std_path.components().next() {
        // Windows absolute path with a drive or UNC prefix.
        Some(Component::Prefix(prefix)) => {
            let prefix_str = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;

            let base = Utf8PathBuf::from(prefix_str).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .or_else(|_| std_path.strip_prefix(prefix.as_os_str()))
                .map_err(|_| io::Error::other("failed to strip prefix from path"))?
                .to_path_buf();
            (base, relative)
        }
        // Unix-style absolute path.
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = std_path
                .strip_prefix(base.as_std_path())
                .map_err(|_| io::Error::other("failed to strip root from absolute path"))?
                .to_path_buf();
            (base, relative)
        }
        // Relative path: resolve from the current directory.
        _ => (Utf8PathBuf::from("."), std_path.to_path_buf()),
    };

    let dir = open_ambient_dir(&base)?;
    let relative =
        Utf8PathBuf::from_path_buf(relative).map_err(|_| io::Error::other("non-UTF-8 path"))?;

    Ok((dir, relative))
}

/// Reduce an untrusted relative path to plain components.
///
/// Returns `None` for absolute paths, paths containing `..`, or paths with no
/// normal component. `.` segments are dropped.
#[must_use]
pub fn sanitise_relative(path: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut clean = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(segment) => clean.push(segment),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return None;
            }
        }
    }
    (!clean.as_os_str().is_empty()).then_some(clean)
}

/// Write `contents` at `relative` inside `dir`, creating parent directories on demand.
///
/// Existing files are truncated, so the last write to a path wins.
///
/// # Errors
/// Rejects paths that would leave `dir` and propagates I/O errors.
pub fn write_relative(dir: &fs_utf8::Dir, relative: &Utf8Path, contents: &[u8]) -> io::Result<()> {
    let clean = sanitise_relative(relative).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{relative} escapes the sandbox"),
        )
    })?;
    if let Some(parent) = clean.parent()
        && !parent.as_os_str().is_empty()
    {
        dir.create_dir_all(parent)?;
    }
    dir.write(&clean, contents)
}

/// A file discovered under a directory capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceEntry {
    /// Path relative to the directory that was listed.
    pub path: Utf8PathBuf,
    /// Size in bytes when listed.
    pub size: u64,
}

impl SourceEntry {
    /// Path segments from the listed directory down to the file.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.iter()
    }

    /// Whether the file sits directly in the listed directory.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.path.components().count() == 1
    }
}

/// Recursively list every regular file below `dir`, sorted by path.
///
/// # Errors
/// Propagates I/O errors from reading directories or metadata.
pub fn list_files(dir: &fs_utf8::Dir) -> io::Result<Vec<SourceEntry>> {
    let mut files = Vec::new();
    walk(dir, Utf8Path::new(""), &mut |path, kind, size| {
        if kind == EntryKind::File {
            files.push(SourceEntry {
                path: path.to_path_buf(),
                size,
            });
        }
    })?;
    files.sort();
    Ok(files)
}

/// List names of regular files directly inside `dir`, sorted.
///
/// # Errors
/// Propagates I/O errors from reading the directory.
pub fn list_top_level_files(dir: &fs_utf8::Dir) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name()?);
        }
    }
    names.sort();
    Ok(names)
}

/// List every subdirectory below `dir` breadth-first, siblings sorted by name.
///
/// The root itself is not included.
///
/// # Errors
/// Propagates I/O errors from reading directories.
pub fn list_dirs_breadth_first(dir: &fs_utf8::Dir) -> io::Result<Vec<Utf8PathBuf>> {
    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([Utf8PathBuf::new()]);
    while let Some(current) = queue.pop_front() {
        let handle = if current.as_os_str().is_empty() {
            dir.try_clone()?
        } else {
            dir.open_dir(&current)?
        };
        let mut children = Vec::new();
        for entry in handle.entries()? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                children.push(current.join(entry.file_name()?));
            }
        }
        children.sort();
        for child in children {
            ordered.push(child.clone());
            queue.push_back(child);
        }
    }
    Ok(ordered)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
}

fn walk(
    dir: &fs_utf8::Dir,
    prefix: &Utf8Path,
    visit: &mut dyn FnMut(&Utf8Path, EntryKind, u64),
) -> io::Result<()> {
    for entry in dir.entries()? {
        let entry = entry?;
        let path = prefix.join(entry.file_name()?);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            visit(&path, EntryKind::Directory, 0);
            let child = entry.open_dir()?;
            walk(&child, &path, visit)?;
        } else if file_type.is_file() {
            let size = entry.metadata()?.len();
            visit(&path, EntryKind::File, size);
        }
    }
    Ok(())
}
