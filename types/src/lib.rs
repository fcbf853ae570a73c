//! Core domain types for StoryMe.
//!
//! This crate contains pure domain types with no IO and minimal dependencies:
//! path segment sanitization, ingest target resolution, media classification,
//! and identifier newtypes. Everything here can be used from any layer.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ids;
mod media;
mod segment;
mod target;

pub use ids::{AssetId, TransactionId};
pub use media::MediaType;
pub use segment::{
    InvalidSegment, normalize_unicode, sanitize_segment, split_extension, unique_filename,
    unique_name,
};
pub use target::{
    IngestTarget, NodeType, ProjectLayout, TargetDescriptor, TargetError, normalize_episode_name,
    resolve_target,
};
