//! Backlink maintenance for companion documents.
//!
//! A document "links" an asset when it contains the asset's `[[id]]` token.
//! [`upsert_backlink`] appends a `- [[id]] relative/path` line under the
//! `## Linked Assets` heading and hands back a [`DocumentBackup`] that
//! [`restore_backup`] can replay to undo the change.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::debug;

use storyme_types::AssetId;
use storyme_utils::Filesystem;

pub const LINKED_ASSETS_HEADING: &str = "## Linked Assets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAsset {
    pub asset_id: AssetId,
    /// Path of the asset relative to the document's directory.
    pub relative_path: String,
}

/// Document content as it was before the first write of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorDocument {
    Existed(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBackup {
    pub path: PathBuf,
    pub prior: PriorDocument,
}

/// Append `link` to `content`.
///
/// Returns `None` when the content already references the asset.
#[must_use]
pub fn append_linked_asset(content: &str, link: &LinkedAsset) -> Option<String> {
    let token = link.asset_id.link_token();
    if content.contains(&token) {
        return None;
    }

    let line = format!("- {token} {}", link.relative_path);
    let line = line.trim_end();
    let trimmed = content.trim_end();

    let lines: Vec<&str> = trimmed.lines().collect();
    let Some(heading) = lines
        .iter()
        .position(|l| l.trim_end() == LINKED_ASSETS_HEADING)
    else {
        if trimmed.is_empty() {
            return Some(format!("{LINKED_ASSETS_HEADING}\n{line}\n"));
        }
        return Some(format!("{trimmed}\n\n{LINKED_ASSETS_HEADING}\n{line}\n"));
    };

    let section_end = lines[heading + 1..]
        .iter()
        .position(|l| l.starts_with('#'))
        .map_or(lines.len(), |offset| heading + 1 + offset);
    let last_entry = lines[heading..section_end]
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(heading, |offset| heading + offset);

    let mut out = lines[..=last_entry].join("\n");
    out.push('\n');
    out.push_str(line);
    out.push('\n');
    if last_entry + 1 < lines.len() {
        out.push_str(&lines[last_entry + 1..].join("\n"));
        out.push('\n');
    }
    Some(out)
}

/// Ensure the document at `path` links `link.asset_id`.
///
/// A missing document counts as empty and is created along with its parent
/// directories. No write happens when the link is already present.
pub fn upsert_backlink<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    link: &LinkedAsset,
) -> io::Result<DocumentBackup> {
    let prior = match fs.read_to_string(path) {
        Ok(content) => PriorDocument::Existed(content),
        Err(err) if err.kind() == ErrorKind::NotFound => PriorDocument::Missing,
        Err(err) => return Err(err),
    };
    let current = match &prior {
        PriorDocument::Existed(content) => content.as_str(),
        PriorDocument::Missing => "",
    };

    match append_linked_asset(current, link) {
        Some(next) => {
            if let Some(parent) = path.parent() {
                fs.create_dir_all(parent)?;
            }
            fs.write(path, next.as_bytes())?;
            debug!(path = %path.display(), asset_id = %link.asset_id, "Linked asset");
        }
        None => {
            debug!(path = %path.display(), asset_id = %link.asset_id, "Asset already linked");
        }
    }

    Ok(DocumentBackup {
        path: path.to_path_buf(),
        prior,
    })
}

/// Put a document back the way [`upsert_backlink`] found it.
pub fn restore_backup<F: Filesystem + ?Sized>(fs: &F, backup: &DocumentBackup) -> io::Result<()> {
    match &backup.prior {
        PriorDocument::Existed(content) => fs.write(&backup.path, content.as_bytes()),
        PriorDocument::Missing => fs.remove_all(&backup.path),
    }
}

/// Asset ids referenced by `[[id]]` tokens, in order of first appearance.
#[must_use]
pub fn linked_asset_ids(content: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            break;
        };
        let id = after[..end].trim();
        if !id.is_empty() && !id.contains('\n') && !id.contains("[[") && !ids.iter().any(|s| s == id)
        {
            ids.push(id.to_string());
        }
        rest = &after[end + 2..];
    }
    ids
}
