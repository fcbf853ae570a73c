//! Document-level logic for StoryMe.
//!
//! Everything here operates on single documents or sidecar files through the
//! [`storyme_utils::Filesystem`] collaborator: frontmatter headers, backlink
//! maintenance, media sidecars, the scene order manifest, and asset
//! documents. Multi-step orchestration lives in `storyme-engine`.

pub mod asset_document;
pub mod frontmatter;
mod ids;
pub mod linking;
pub mod manifest;
pub mod sidecar;

pub use asset_document::{
    AssetDocumentError, AssetFields, AssetMetadata, DEFAULT_AUTHOR, MetadataMigration,
    MigrateOptions, NewAssetDocument, ParsedAssetDocument, bump_asset_revision,
    create_asset_document, format_timestamp, migrate_metadata, parse_asset_document,
    validate_metadata,
};
pub use frontmatter::{Frontmatter, join_frontmatter, split_frontmatter};
pub use ids::{IdSource, SequentialIds, UuidIds};
pub use linking::{
    DocumentBackup, LINKED_ASSETS_HEADING, LinkedAsset, PriorDocument, append_linked_asset,
    linked_asset_ids, restore_backup, upsert_backlink,
};
pub use manifest::{
    ManifestError, SCENE_ORDER_FILE, SceneOrderEntry, entries_for, manifest_path,
    ordered_scene_names, read_manifest, write_manifest,
};
pub use sidecar::{
    MediaMetadataSidecar, SIDECAR_SCHEMA_VERSION, SidecarError, read_sidecar, sidecar_path,
    write_merged,
};
