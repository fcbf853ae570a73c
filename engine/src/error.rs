//! Errors surfaced by the ingest engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use storyme_core::SidecarError;
use storyme_types::{InvalidSegment, TargetError};

/// A request that was rejected before any filesystem access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported ingest mode {0:?}; expected \"copy\" or \"move\"")]
    UnsupportedMode(String),
    #[error("inputs must be a non-empty list")]
    EmptyInputs,
    #[error(transparent)]
    Target(#[from] TargetError),
}

/// Batch-level failure. Per-item failures never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to create ingest directory {}: {source}", path.display())]
    CreateBaseDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single input could not be imported.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("source {} is not accessible: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("source {} has no file name", path.display())]
    NoFileName { path: PathBuf },
    #[error("failed to prepare {}: {source}", path.display())]
    Prepare {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Name(#[from] InvalidSegment),
    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Sidecar(#[from] SidecarError),
    #[error("failed to link asset into {}: {source}", path.display())]
    Link {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
