//! Shared test utilities and fixtures
//!
//! Project trees on temp directories and fault-injecting filesystems.

#![allow(dead_code)]

use std::cell::Cell;
use std::fs::{self, Metadata};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use storyme_engine::{
    Filesystem, IngestEngine, LocalFs, RenameError, SequentialIds, TargetDescriptor,
};
use tempfile::TempDir;

/// A project root plus a separate directory holding files to import.
pub struct Fixture {
    pub project: TempDir,
    pub inbox: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            project: tempfile::tempdir().expect("project tempdir"),
            inbox: tempfile::tempdir().expect("inbox tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.project.path()
    }

    /// Write `contents` to `<inbox>/<rel>`, creating parents.
    pub fn source(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.inbox.path().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, contents).expect("seed source");
        path
    }

    /// Write `contents` to `<project>/<rel>`, creating parents.
    pub fn project_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, contents).expect("seed project file");
        path
    }
}

pub fn scene_card(episode: &str, scene: &str) -> TargetDescriptor {
    TargetDescriptor::new("scene_card")
        .with_episode(episode)
        .with_scene(scene)
}

/// Engine with ids `id-1`, `id-2`, ... (the transaction draws first).
pub fn engine() -> IngestEngine {
    IngestEngine::new().with_ids(SequentialIds::new("id"))
}

pub fn engine_on<F: Filesystem>(fs: F) -> IngestEngine<F> {
    IngestEngine::with_filesystem(fs).with_ids(SequentialIds::new("id"))
}

/// Sorted entry names of `dir`, or empty when it does not exist.
pub fn listing(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Local disk with injectable faults.
#[derive(Debug, Default)]
pub struct FaultyFs {
    pub inner: LocalFs,
    /// Every rename reports a cross-device failure.
    pub cross_device: bool,
    /// Writes to paths ending with this suffix fail.
    pub fail_writes_ending_with: Option<String>,
    /// Removal of paths ending with this suffix fails.
    pub fail_removes_ending_with: Option<String>,
    pub renames: Cell<usize>,
}

impl FaultyFs {
    pub fn cross_device() -> Self {
        Self {
            cross_device: true,
            ..Self::default()
        }
    }

    fn hits(suffix: Option<&String>, path: &Path) -> bool {
        suffix.is_some_and(|s| path.to_string_lossy().ends_with(s.as_str()))
    }
}

impl Filesystem for FaultyFs {
    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        self.inner.metadata(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.inner.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if Self::hits(self.fail_writes_ending_with.as_ref(), path) {
            return Err(io::Error::new(ErrorKind::PermissionDenied, "injected write failure"));
        }
        self.inner.write(path, contents)
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if Self::hits(self.fail_writes_ending_with.as_ref(), path) {
            return Err(io::Error::new(ErrorKind::PermissionDenied, "injected write failure"));
        }
        self.inner.write_new(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        self.inner.list_dir(path)
    }

    fn copy_new(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.inner.copy_new(from, to)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), RenameError> {
        self.renames.set(self.renames.get() + 1);
        if self.cross_device {
            return Err(RenameError::from_rename(io::Error::from(
                ErrorKind::CrossesDevices,
            )));
        }
        self.inner.rename(from, to)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        if Self::hits(self.fail_removes_ending_with.as_ref(), path) {
            return Err(io::Error::new(ErrorKind::PermissionDenied, "injected remove failure"));
        }
        self.inner.remove_all(path)
    }
}
