//! Revision-gated document saves.
//!
//! A document's frontmatter `rev` is its revision. A save names the revision
//! it was based on; when that is no longer current, nothing is overwritten
//! and both versions land in a conflict artifact for manual merging.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use storyme_core::{Frontmatter, format_timestamp, join_frontmatter, split_frontmatter};
use storyme_utils::Filesystem;

use crate::config::DocumentsConfig;

/// Attempts at finding a free conflict artifact name within one millisecond.
const MAX_ARTIFACT_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    /// Body to store below the frontmatter.
    pub next_body: String,
    pub expected_rev: u64,
    pub updated_by: Option<String>,
    /// Content for the artifact's incoming section instead of `next_body`.
    pub conflict_incoming: Option<String>,
}

impl SaveRequest {
    pub fn new(next_body: impl Into<String>, expected_rev: u64) -> Self {
        Self {
            next_body: next_body.into(),
            expected_rev,
            updated_by: None,
            conflict_incoming: None,
        }
    }

    #[must_use]
    pub fn updated_by(mut self, author: impl Into<String>) -> Self {
        self.updated_by = Some(author.into());
        self
    }

    #[must_use]
    pub fn conflict_incoming(mut self, incoming: impl Into<String>) -> Self {
        self.conflict_incoming = Some(incoming.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SaveOutcome {
    Saved { rev: u64 },
    Conflict { current_rev: u64, conflict_path: PathBuf },
}

impl SaveOutcome {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no free conflict artifact name for {}", path.display())]
    ArtifactNamesExhausted { path: PathBuf },
}

/// Revision recorded in `frontmatter`; 1 when absent or not a positive integer.
#[must_use]
pub fn current_revision(frontmatter: &Frontmatter) -> u64 {
    frontmatter
        .get("rev")
        .and_then(Value::as_u64)
        .filter(|rev| *rev >= 1)
        .unwrap_or(1)
}

/// Save `request` into the document at `path`, stamping the time as now.
pub fn save_with_lock<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    request: &SaveRequest,
    documents: &DocumentsConfig,
) -> Result<SaveOutcome, SaveError> {
    save_with_lock_at(fs, path, request, documents, Utc::now())
}

/// [`save_with_lock`] with an explicit clock.
pub fn save_with_lock_at<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    request: &SaveRequest,
    documents: &DocumentsConfig,
    now: DateTime<Utc>,
) -> Result<SaveOutcome, SaveError> {
    let raw = match fs.read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(SaveError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let (mut frontmatter, body) = split_frontmatter(&raw);
    let current_rev = current_revision(&frontmatter);

    if request.expected_rev != current_rev {
        let incoming = request
            .conflict_incoming
            .as_deref()
            .unwrap_or(request.next_body.as_str());
        let artifact = render_conflict(request.expected_rev, current_rev, body, incoming);
        let conflict_path =
            write_conflict_artifact(fs, path, &documents.conflicts_dir, &artifact, now)?;
        warn!(
            path = %path.display(),
            expected_rev = request.expected_rev,
            current_rev,
            conflict = %conflict_path.display(),
            "Save rejected: revision conflict"
        );
        return Ok(SaveOutcome::Conflict {
            current_rev,
            conflict_path,
        });
    }

    let rev = current_rev.saturating_add(1);
    let author = request
        .updated_by
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(documents.default_author.as_str());
    frontmatter.set("rev", rev);
    frontmatter.set("updated_at", format_timestamp(now));
    frontmatter.set("updated_by", author);

    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent).map_err(|source| SaveError::Io {
            action: "create directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let next = join_frontmatter(&frontmatter, &request.next_body);
    fs.write(path, next.as_bytes()).map_err(|source| SaveError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rev, "Saved document");
    Ok(SaveOutcome::Saved { rev })
}

fn render_conflict(expected_rev: u64, current_rev: u64, current: &str, incoming: &str) -> String {
    format!(
        "# Manual Merge Required\n\n\
         - expected_rev: {expected_rev}\n\
         - current_rev: {current_rev}\n\n\
         ## Current\n{current}\n\n\
         ## Incoming\n{incoming}\n"
    )
}

/// Create a fresh artifact in the conflicts directory next to `document`.
///
/// Existing artifacts are never replaced; a clash within the same
/// millisecond gets a numeric suffix.
fn write_conflict_artifact<F: Filesystem + ?Sized>(
    fs: &F,
    document: &Path,
    conflicts_dir: &str,
    artifact: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf, SaveError> {
    let dir = document
        .parent()
        .map_or_else(|| PathBuf::from(conflicts_dir), |p| p.join(conflicts_dir));
    fs.create_dir_all(&dir).map_err(|source| SaveError::Io {
        action: "create directory",
        path: dir.clone(),
        source,
    })?;

    let name = document
        .file_name()
        .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());
    let stamp = now.timestamp_millis();

    for attempt in 1..=MAX_ARTIFACT_ATTEMPTS {
        let file_name = if attempt == 1 {
            format!("{name}.conflict-{stamp}.md")
        } else {
            format!("{name}.conflict-{stamp}-{attempt}.md")
        };
        let candidate = dir.join(file_name);
        match fs.write_new(&candidate, artifact.as_bytes()) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(SaveError::Io {
                    action: "write conflict artifact",
                    path: candidate,
                    source,
                });
            }
        }
    }
    Err(SaveError::ArtifactNamesExhausted { path: dir })
}
