//! Scene order manifest (`.scene-order.json`).
//!
//! The manifest, not the directory listing, is the authoritative display
//! order of an episode's scenes.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use storyme_utils::Filesystem;

pub const SCENE_ORDER_FILE: &str = ".scene-order.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneOrderEntry {
    /// 1-based rank.
    pub order: u32,
    pub scene_name: String,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to {action} scene order manifest {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed scene order manifest {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[must_use]
pub fn manifest_path(scenes_dir: &Path) -> PathBuf {
    scenes_dir.join(SCENE_ORDER_FILE)
}

/// Build entries ranking `names` in the given order.
#[must_use]
pub fn entries_for<S: AsRef<str>>(names: &[S]) -> Vec<SceneOrderEntry> {
    names
        .iter()
        .zip(1u32..)
        .map(|(name, order)| SceneOrderEntry {
            order,
            scene_name: name.as_ref().to_string(),
        })
        .collect()
}

/// Read the manifest in `scenes_dir`; `Ok(None)` when there is none.
pub fn read_manifest<F: Filesystem + ?Sized>(
    fs: &F,
    scenes_dir: &Path,
) -> Result<Option<Vec<SceneOrderEntry>>, ManifestError> {
    let path = manifest_path(scenes_dir);
    let raw = match fs.read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ManifestError::Io {
                action: "read",
                path,
                source,
            });
        }
    };
    let entries = serde_json::from_str(&raw).map_err(|source| ManifestError::Json {
        path: path.clone(),
        source,
    })?;
    Ok(Some(entries))
}

/// Atomically replace the manifest in `scenes_dir`.
pub fn write_manifest<F: Filesystem + ?Sized>(
    fs: &F,
    scenes_dir: &Path,
    entries: &[SceneOrderEntry],
) -> Result<PathBuf, ManifestError> {
    let path = manifest_path(scenes_dir);
    let bytes = serde_json::to_vec_pretty(entries).map_err(|source| ManifestError::Json {
        path: path.clone(),
        source,
    })?;
    fs.write(&path, &bytes).map_err(|source| ManifestError::Io {
        action: "write",
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Scene names sorted by rank.
#[must_use]
pub fn ordered_scene_names(entries: &[SceneOrderEntry]) -> Vec<String> {
    let mut sorted: Vec<&SceneOrderEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.order);
    sorted.into_iter().map(|e| e.scene_name.clone()).collect()
}
