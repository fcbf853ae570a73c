//! Shared infrastructure utilities for StoryMe.
//!
//! This crate provides the IO plumbing the engine needs but that doesn't
//! belong in the domain-pure `storyme-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`fs`**: The [`Filesystem`] collaborator and its local-disk implementation
//! - **`path`**: Relative link paths and `/`-separated rendering

pub mod atomic_write;
pub mod fs;
pub mod path;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, atomic_write,
    atomic_write_new_with_options, atomic_write_with_options,
};
pub use fs::{Filesystem, LocalFs, MoveStrategy, RenameError};
pub use path::{relative_path, to_slash_string};
