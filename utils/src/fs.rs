//! Filesystem collaborator used by the ingest, reorder, and save flows.
//!
//! Everything that mutates the project tree goes through [`Filesystem`] so the
//! engine can be driven against a fault-injecting implementation in tests.
//! [`LocalFs`] is the real thing.

use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::atomic_write::{AtomicWriteOptions, atomic_write_new_with_options, atomic_write_with_options};

#[derive(Debug, Error)]
pub enum RenameError {
    /// Source and destination live on different devices; callers may fall
    /// back to copy + delete.
    #[error("rename crosses filesystem boundaries: {0}")]
    CrossDevice(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RenameError {
    /// Classify a raw rename failure.
    #[must_use]
    pub fn from_rename(err: io::Error) -> Self {
        if err.kind() == ErrorKind::CrossesDevices {
            Self::CrossDevice(err)
        } else {
            Self::Io(err)
        }
    }

    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self {
            Self::CrossDevice(err) | Self::Io(err) => err,
        }
    }
}

/// How a [`Filesystem::move_path`] call got the entry to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    Renamed,
    CopiedThenRemoved,
}

pub trait Filesystem {
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace `path` with `contents` atomically.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Create `path` with `contents`; fails if anything already lives there.
    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Entry names of a directory, in no particular order.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Copy a file or directory tree to a destination that must not exist.
    fn copy_new(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<(), RenameError>;

    /// Remove a file or directory tree. A missing path is not an error.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Move an entry without clobbering the destination.
    ///
    /// Tries a rename first; when the rename crosses devices, copies the entry
    /// and removes the source.
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<MoveStrategy> {
        if self.exists(to) {
            return Err(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("destination already exists: {}", to.display()),
            ));
        }
        match self.rename(from, to) {
            Ok(()) => Ok(MoveStrategy::Renamed),
            Err(RenameError::CrossDevice(err)) => {
                debug!(
                    from = %from.display(),
                    to = %to.display(),
                    "rename crossed devices, falling back to copy: {err}"
                );
                self.copy_new(from, to)?;
                self.remove_all(from)?;
                Ok(MoveStrategy::CopiedThenRemoved)
            }
            Err(RenameError::Io(err)) => Err(err),
        }
    }
}

/// The local disk.
#[derive(Debug, Clone, Copy)]
pub struct LocalFs {
    write_options: AtomicWriteOptions,
}

impl LocalFs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            write_options: AtomicWriteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_write_options(write_options: AtomicWriteOptions) -> Self {
        Self { write_options }
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFs {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        fs::metadata(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        atomic_write_with_options(path, contents, self.write_options)
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        atomic_write_new_with_options(path, contents, self.write_options)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    fn copy_new(&self, from: &Path, to: &Path) -> io::Result<()> {
        copy_entry_new(from, to)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), RenameError> {
        fs::rename(from, to).map_err(RenameError::from_rename)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }
}

fn copy_entry_new(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from)?;
    if meta.is_dir() {
        fs::create_dir(to)?;
        let result = copy_dir_contents(from, to);
        if result.is_err() {
            let _ = fs::remove_dir_all(to);
        }
        result
    } else {
        copy_file_new(from, to, &meta)
    }
}

fn copy_dir_contents(from: &Path, to: &Path) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        copy_entry_new(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

fn copy_file_new(from: &Path, to: &Path, meta: &Metadata) -> io::Result<()> {
    let mut src = File::open(from)?;
    let mut dst = OpenOptions::new().write(true).create_new(true).open(to)?;
    let result = io::copy(&mut src, &mut dst)
        .and_then(|_| dst.sync_all())
        .and_then(|()| fs::set_permissions(to, meta.permissions()));
    if result.is_err() {
        drop(dst);
        let _ = fs::remove_file(to);
    }
    result
}
