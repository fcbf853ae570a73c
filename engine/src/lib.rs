//! Transactional media ingest and workspace consistency for StoryMe.
//!
//! This crate orchestrates multi-step filesystem mutations so they look
//! atomic to callers:
//!
//! - **`ingest`**: batch import with per-item failure isolation and
//!   single-slot undo ([`IngestEngine`])
//! - **`reorder`**: two-phase renumbering of scene documents and directories
//! - **`revision`**: optimistic-lock document saves with conflict artifacts
//! - **`workspace`**: scene cards, asset folders, episode bindings, backlinks
//!
//! Everything is synchronous and goes through [`Filesystem`]; callers on an
//! async runtime run it on a blocking thread.

mod config;
mod error;
mod ingest;
mod reorder;
mod revision;
mod workspace;

pub use config::{
    CONFIG_DIR, CONFIG_FILE, ConfigError, DocumentsConfig, EngineConfig, IngestConfig,
    project_config_path, user_config_path,
};
pub use error::{IngestError, ItemError, ValidationError};
pub use ingest::{
    BatchProgress, BatchResult, BatchSummary, BatchTransaction, IngestEngine, IngestMode,
    IngestRequest, ItemResult, MoveEntry, UndoOutcome, UndoReport,
};
pub use reorder::{ReorderError, ReorderReport, renumbered_name, reorder_entries, reorder_scenes};
pub use revision::{
    SaveError, SaveOutcome, SaveRequest, current_revision, save_with_lock, save_with_lock_at,
};
pub use workspace::{
    ASSET_DOCUMENT_FILE, CreatedAsset, EpisodeBindings, SceneCard, Workspace, WorkspaceError,
};

pub use storyme_core::{IdSource, SceneOrderEntry, SequentialIds, UuidIds};
pub use storyme_types::{
    AssetId, IngestTarget, MediaType, NodeType, ProjectLayout, TargetDescriptor, TransactionId,
};
pub use storyme_utils::{Filesystem, LocalFs, MoveStrategy, RenameError};
