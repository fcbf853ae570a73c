//! Batch media ingest with single-slot undo.
//!
//! # Design notes
//!
//! - Inputs are processed strictly one at a time: each item's unique name is
//!   picked against a directory listing that must include the files written
//!   by earlier items of the same batch.
//! - A failing item becomes an [`ItemResult::Failed`] entry and the loop moves
//!   on. Anything the item created before failing stays in the transaction so
//!   undo still removes it.
//! - The engine keeps exactly one [`BatchTransaction`]. Starting a new batch
//!   replaces it, so only the most recent import can be undone, and only while
//!   this engine instance lives.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, info, warn};

use storyme_core::{
    DocumentBackup, IdSource, LinkedAsset, MediaMetadataSidecar, SIDECAR_SCHEMA_VERSION, UuidIds,
    restore_backup, sidecar_path, upsert_backlink, write_merged,
};
use storyme_types::{
    AssetId, IngestTarget, MediaType, ProjectLayout, TargetDescriptor, TransactionId,
    unique_filename,
};
use storyme_utils::{Filesystem, LocalFs, relative_path, to_slash_string};

use crate::config::EngineConfig;
use crate::error::{IngestError, ItemError, ValidationError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Duplicate the source; it stays where it was.
    #[default]
    Copy,
    /// Relocate the source into the project.
    Move,
}

impl IngestMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IngestMode::Copy => "copy",
            IngestMode::Move => "move",
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IngestMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(IngestMode::Copy),
            "move" => Ok(IngestMode::Move),
            _ => Err(ValidationError::UnsupportedMode(s.to_string())),
        }
    }
}

/// One batch import.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub project_root: PathBuf,
    pub target: TargetDescriptor,
    pub inputs: Vec<PathBuf>,
    /// `None` uses the engine's default mode.
    pub mode: Option<IngestMode>,
    /// Overrides the companion document derived from the target.
    pub companion_document_path: Option<PathBuf>,
}

impl IngestRequest {
    pub fn new(
        project_root: impl Into<PathBuf>,
        target: TargetDescriptor,
        inputs: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            target,
            inputs: inputs.into_iter().map(Into::into).collect(),
            mode: None,
            companion_document_path: None,
        }
    }

    pub fn with_mode(mut self, mode: IngestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_companion_document(mut self, path: impl Into<PathBuf>) -> Self {
        self.companion_document_path = Some(path.into());
        self
    }
}

/// Reported to the progress sink after every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ItemResult {
    Success {
        source_path: PathBuf,
        destination_path: PathBuf,
        metadata_path: PathBuf,
        asset_id: AssetId,
    },
    Failed {
        source_path: PathBuf,
        error: String,
    },
}

impl ItemResult {
    #[must_use]
    pub fn source_path(&self) -> &Path {
        match self {
            ItemResult::Success { source_path, .. } | ItemResult::Failed { source_path, .. } => {
                source_path
            }
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ItemResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub mode: IngestMode,
    pub target: IngestTarget,
    pub summary: BatchSummary,
    pub results: Vec<ItemResult>,
    pub transaction_id: TransactionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Everything a batch changed, in the order it changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTransaction {
    pub id: TransactionId,
    pub copy_destinations: Vec<PathBuf>,
    pub move_entries: Vec<MoveEntry>,
    pub metadata_sidecar_paths: Vec<PathBuf>,
    /// One backup per distinct companion document, taken before its first
    /// write in the batch.
    pub companion_doc_backups: Vec<DocumentBackup>,
}

impl BatchTransaction {
    fn new(id: TransactionId) -> Self {
        Self {
            id,
            copy_destinations: Vec::new(),
            move_entries: Vec::new(),
            metadata_sidecar_paths: Vec::new(),
            companion_doc_backups: Vec::new(),
        }
    }

    fn has_backup_for(&self, path: &Path) -> bool {
        self.companion_doc_backups.iter().any(|b| b.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoReport {
    pub transaction_id: TransactionId,
    pub reverted_count: usize,
    pub failed_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone(UndoReport),
    NothingToUndo,
}

impl Serialize for UndoOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UndoOutcome::Undone(report) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("undone", &true)?;
                map.serialize_entry("transactionId", &report.transaction_id)?;
                map.serialize_entry("revertedCount", &report.reverted_count)?;
                map.serialize_entry("failedSteps", &report.failed_steps)?;
                map.end()
            }
            UndoOutcome::NothingToUndo => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("undone", &false)?;
                map.serialize_entry("reason", "no-transaction")?;
                map.end()
            }
        }
    }
}

/// Per-batch values shared by every item.
struct BatchContext<'a> {
    project_root: &'a Path,
    target: &'a IngestTarget,
    companion: Option<&'a Path>,
    mode: IngestMode,
}

/// Imports files into a project and remembers the last batch for undo.
pub struct IngestEngine<F: Filesystem = LocalFs> {
    fs: F,
    ids: Box<dyn IdSource + Send + Sync>,
    layout: ProjectLayout,
    default_mode: IngestMode,
    last_transaction: Option<BatchTransaction>,
}

impl<F: Filesystem + fmt::Debug> fmt::Debug for IngestEngine<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestEngine")
            .field("fs", &self.fs)
            .field("layout", &self.layout)
            .field("default_mode", &self.default_mode)
            .field("last_transaction", &self.last_transaction)
            .finish_non_exhaustive()
    }
}

impl IngestEngine<LocalFs> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_filesystem(LocalFs::new())
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new()
            .with_layout(config.layout.clone())
            .with_default_mode(config.ingest.default_mode)
    }
}

impl Default for IngestEngine<LocalFs> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Filesystem> IngestEngine<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self {
            fs,
            ids: Box::new(UuidIds),
            layout: ProjectLayout::default(),
            default_mode: IngestMode::default(),
            last_transaction: None,
        }
    }

    pub fn with_ids(mut self, ids: impl IdSource + Send + Sync + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn with_layout(mut self, layout: ProjectLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_default_mode(mut self, mode: IngestMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// The transaction [`IngestEngine::undo_last_import`] would revert.
    pub fn pending_transaction(&self) -> Option<&BatchTransaction> {
        self.last_transaction.as_ref()
    }

    pub fn last_transaction_id(&self) -> Option<&TransactionId> {
        self.last_transaction.as_ref().map(|t| &t.id)
    }

    pub fn ingest_batch(&mut self, request: &IngestRequest) -> Result<BatchResult, IngestError> {
        self.run_batch(request, &mut |_: &BatchProgress| {})
    }

    /// Like [`IngestEngine::ingest_batch`], calling `on_progress` after each item.
    pub fn ingest_batch_with_progress(
        &mut self,
        request: &IngestRequest,
        mut on_progress: impl FnMut(&BatchProgress),
    ) -> Result<BatchResult, IngestError> {
        self.run_batch(request, &mut on_progress)
    }

    fn run_batch(
        &mut self,
        request: &IngestRequest,
        on_progress: &mut dyn FnMut(&BatchProgress),
    ) -> Result<BatchResult, IngestError> {
        if request.inputs.is_empty() {
            return Err(ValidationError::EmptyInputs.into());
        }
        let mode = request.mode.unwrap_or(self.default_mode);
        let target = self
            .layout
            .resolve_target(&request.project_root, &request.target)
            .map_err(ValidationError::from)?;

        self.fs
            .create_dir_all(&target.base_path)
            .map_err(|source| IngestError::CreateBaseDir {
                path: target.base_path.clone(),
                source,
            })?;

        let companion = request
            .companion_document_path
            .as_deref()
            .or(target.companion_document_path.as_deref());
        let ctx = BatchContext {
            project_root: &request.project_root,
            target: &target,
            companion,
            mode,
        };

        let mut txn = BatchTransaction::new(TransactionId::new(self.ids.next_id()));
        let total = request.inputs.len();
        let mut completed = 0;
        let mut results = Vec::with_capacity(total);

        for (index, source) in request.inputs.iter().enumerate() {
            let result = match self.ingest_item(&ctx, source, &mut txn) {
                Ok(result) => {
                    completed += 1;
                    result
                }
                Err(err) => {
                    debug!(source = %source.display(), "Ingest item failed: {err}");
                    ItemResult::Failed {
                        source_path: source.clone(),
                        error: err.to_string(),
                    }
                }
            };
            results.push(result);

            let processed = index + 1;
            on_progress(&BatchProgress {
                processed,
                total,
                completed,
                failed: processed - completed,
            });
        }

        info!(
            transaction_id = %txn.id,
            mode = %mode,
            target = %target.logical_path,
            total,
            completed,
            failed = total - completed,
            "Ingest batch finished"
        );

        let transaction_id = txn.id.clone();
        if let Some(previous) = self.last_transaction.replace(txn) {
            debug!(transaction_id = %previous.id, "Discarded undo for previous batch");
        }

        Ok(BatchResult {
            mode,
            target,
            summary: BatchSummary {
                total,
                completed,
                failed: total - completed,
            },
            results,
            transaction_id,
        })
    }

    fn ingest_item(
        &self,
        ctx: &BatchContext<'_>,
        source: &Path,
        txn: &mut BatchTransaction,
    ) -> Result<ItemResult, ItemError> {
        self.fs
            .metadata(source)
            .map_err(|e| ItemError::Source {
                path: source.to_path_buf(),
                source: e,
            })?;
        let file_name = source
            .file_name()
            .ok_or_else(|| ItemError::NoFileName {
                path: source.to_path_buf(),
            })?
            .to_string_lossy();

        let media_type = MediaType::classify(source);
        let bucket_dir = ctx.target.base_path.join(media_type.bucket());
        let prepare_err = |e| ItemError::Prepare {
            path: bucket_dir.clone(),
            source: e,
        };
        self.fs.create_dir_all(&bucket_dir).map_err(prepare_err)?;
        let existing = self.fs.list_dir(&bucket_dir).map_err(prepare_err)?;
        let destination = bucket_dir.join(unique_filename(&file_name, &existing)?);

        match ctx.mode {
            IngestMode::Copy => {
                self.fs
                    .copy_new(source, &destination)
                    .map_err(|e| ItemError::Copy {
                        from: source.to_path_buf(),
                        to: destination.clone(),
                        source: e,
                    })?;
                txn.copy_destinations.push(destination.clone());
            }
            IngestMode::Move => {
                if let Err(e) = self.fs.move_path(source, &destination) {
                    // The destination was free before the move, so anything
                    // there now is a copy the fallback left behind.
                    if self.fs.exists(&destination) {
                        warn!(
                            source = %source.display(),
                            destination = %destination.display(),
                            "Move left a copy behind; recording it for undo"
                        );
                        txn.copy_destinations.push(destination.clone());
                    }
                    return Err(ItemError::Move {
                        from: source.to_path_buf(),
                        to: destination,
                        source: e,
                    });
                }
                txn.move_entries.push(MoveEntry {
                    source: source.to_path_buf(),
                    destination: destination.clone(),
                });
            }
        }

        let asset_id = AssetId::new(self.ids.next_id());
        let metadata_path = sidecar_path(&destination);
        let sidecar = MediaMetadataSidecar {
            schema_version: SIDECAR_SCHEMA_VERSION,
            asset_id: asset_id.clone(),
            media_type,
            source_path: source.display().to_string(),
            stored_path: destination.display().to_string(),
            target_node: ctx.target.node_type,
            target_logical_path: ctx.target.logical_path.clone(),
            backlinks: ctx
                .companion
                .map(|doc| to_slash_string(&relative_path(ctx.project_root, doc)))
                .into_iter()
                .collect(),
        };
        txn.metadata_sidecar_paths.push(metadata_path.clone());
        write_merged(&self.fs, &metadata_path, &sidecar)?;

        if let Some(doc) = ctx.companion {
            self.link(doc, &asset_id, &destination, txn)?;
        }

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            asset_id = %asset_id,
            "Ingested item"
        );
        Ok(ItemResult::Success {
            source_path: source.to_path_buf(),
            destination_path: destination,
            metadata_path,
            asset_id,
        })
    }

    fn link(
        &self,
        doc: &Path,
        asset_id: &AssetId,
        destination: &Path,
        txn: &mut BatchTransaction,
    ) -> Result<(), ItemError> {
        let doc_dir = doc.parent().unwrap_or_else(|| Path::new(""));
        let link = LinkedAsset {
            asset_id: asset_id.clone(),
            relative_path: to_slash_string(&relative_path(doc_dir, destination)),
        };
        let backup = upsert_backlink(&self.fs, doc, &link).map_err(|source| ItemError::Link {
            path: doc.to_path_buf(),
            source,
        })?;
        if !txn.has_backup_for(doc) {
            txn.companion_doc_backups.push(backup);
        }
        Ok(())
    }

    /// Revert the most recent batch, best-effort.
    ///
    /// Companion documents are restored first, then sidecars, copies, and
    /// moves are reverted, each in reverse order. A failing step is logged and
    /// counted; the remaining steps still run. The transaction is consumed
    /// either way.
    pub fn undo_last_import(&mut self) -> UndoOutcome {
        let Some(txn) = self.last_transaction.take() else {
            return UndoOutcome::NothingToUndo;
        };

        let mut tally = UndoTally::default();
        for backup in txn.companion_doc_backups.iter().rev() {
            tally.record(
                "restore companion document",
                &backup.path,
                restore_backup(&self.fs, backup),
            );
        }
        for path in txn.metadata_sidecar_paths.iter().rev() {
            tally.record("remove sidecar", path, self.fs.remove_all(path));
        }
        for path in txn.copy_destinations.iter().rev() {
            tally.record("remove copied entry", path, self.fs.remove_all(path));
        }
        for entry in txn.move_entries.iter().rev() {
            tally.record("move entry back", &entry.destination, self.move_back(entry));
        }

        info!(
            transaction_id = %txn.id,
            reverted = tally.reverted,
            failed = tally.failed,
            "Undid ingest batch"
        );
        UndoOutcome::Undone(UndoReport {
            transaction_id: txn.id,
            reverted_count: tally.reverted,
            failed_steps: tally.failed,
        })
    }

    fn move_back(&self, entry: &MoveEntry) -> io::Result<()> {
        if let Some(parent) = entry.source.parent() {
            self.fs.create_dir_all(parent)?;
        }
        self.fs.move_path(&entry.destination, &entry.source)?;
        Ok(())
    }
}

#[derive(Default)]
struct UndoTally {
    reverted: usize,
    failed: usize,
}

impl UndoTally {
    fn record(&mut self, step: &str, path: &Path, result: io::Result<()>) {
        match result {
            Ok(()) => self.reverted += 1,
            Err(e) => {
                warn!(path = %path.display(), step, "Undo step failed: {e}");
                self.failed += 1;
            }
        }
    }
}
