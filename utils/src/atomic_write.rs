//! Crash-safe writes for documents, sidecars and manifests.
//!
//! Bytes are staged in a temp file next to the destination and persisted with
//! a rename, so readers see either the old file or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSyncPolicy {
    SyncAll,
    SkipSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentDirSyncPolicy {
    SyncBestEffort,
    SkipSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicWriteOptions {
    /// Applied to the staged file before it is persisted.
    pub file_sync: FileSyncPolicy,
    /// Applied to the destination directory afterwards.
    pub parent_dir_sync: ParentDirSyncPolicy,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            file_sync: FileSyncPolicy::SyncAll,
            parent_dir_sync: ParentDirSyncPolicy::SkipSync,
        }
    }
}

/// Whether an existing file at the destination may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existing {
    Replace,
    Refuse,
}

const BACKUP_EXTENSION: &str = "bak";

pub fn atomic_write(path: impl AsRef<Path>, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with_options(path, bytes, AtomicWriteOptions::default())
}

/// Replace `path` with `bytes`.
pub fn atomic_write_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    write_staged(path.as_ref(), bytes, options, Existing::Replace)
}

/// Write `bytes` to a path that must not exist yet.
///
/// Fails with `AlreadyExists` instead of replacing an existing file.
pub fn atomic_write_new_with_options(
    path: impl AsRef<Path>,
    bytes: &[u8],
    options: AtomicWriteOptions,
) -> io::Result<()> {
    write_staged(path.as_ref(), bytes, options, Existing::Refuse)
}

fn write_staged(
    path: &Path,
    bytes: &[u8],
    options: AtomicWriteOptions,
    existing: Existing,
) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    if options.file_sync == FileSyncPolicy::SyncAll {
        staged.as_file().sync_all()?;
    }

    match existing {
        Existing::Refuse => {
            staged.persist_noclobber(path).map_err(|e| e.error)?;
        }
        Existing::Replace => {
            if let Err(err) = staged.persist(path) {
                if !path.exists() {
                    return Err(err.error);
                }
                persist_via_backup(err.file, path)?;
            }
        }
    }

    if options.parent_dir_sync == ParentDirSyncPolicy::SyncBestEffort {
        sync_dir(dir);
    }
    Ok(())
}

/// Rename-over-existing failed (Windows): park the old file, persist, then
/// drop the parked copy. The old file comes back if the persist fails.
fn persist_via_backup(staged: NamedTempFile, path: &Path) -> io::Result<()> {
    let parked = free_backup_path(path);
    fs::rename(path, &parked)?;

    if let Err(err) = staged.persist(path) {
        let _ = fs::rename(&parked, path);
        return Err(err.error);
    }
    if let Err(e) = fs::remove_file(&parked) {
        warn!(path = %parked.display(), "Could not remove parked copy after write: {e}");
    }
    Ok(())
}

/// `<file>.bak`, or `<file>.bak.N` when that name is taken.
fn free_backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    let mut candidate = path.with_file_name(&name);
    let mut n = 1u32;
    while candidate.exists() {
        let mut numbered = name.clone();
        numbered.push(format!(".{n}"));
        candidate = path.with_file_name(numbered);
        n += 1;
    }
    candidate
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        debug!(path = %dir.display(), "Directory sync failed: {e}");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
