//! `<file>.meta.json` sidecars written next to every imported file.

use std::ffi::OsString;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use storyme_types::{AssetId, MediaType, NodeType};
use storyme_utils::Filesystem;

pub const SIDECAR_SCHEMA_VERSION: u32 = 1;
pub const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadataSidecar {
    pub schema_version: u32,
    pub asset_id: AssetId,
    pub media_type: MediaType,
    pub source_path: String,
    pub stored_path: String,
    pub target_node: NodeType,
    pub target_logical_path: String,
    /// Companion documents linking this asset, `/`-separated and relative
    /// to the project root.
    #[serde(default)]
    pub backlinks: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to {action} sidecar {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode sidecar {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to decode sidecar {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `photo.png` -> `photo.png.meta.json`.
#[must_use]
pub fn sidecar_path(stored_path: &Path) -> PathBuf {
    let mut name = OsString::from(stored_path.as_os_str());
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Overlay `sidecar` onto whatever JSON object already lives at `path`.
///
/// Fields of `sidecar` win; unknown fields of the existing file survive. An
/// unreadable or non-object existing file is replaced.
pub fn write_merged<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
    sidecar: &MediaMetadataSidecar,
) -> Result<(), SidecarError> {
    let mut merged = read_existing_object(fs, path)?;

    let encode_err = |source| SidecarError::Encode {
        path: path.to_path_buf(),
        source,
    };
    if let Value::Object(fields) = serde_json::to_value(sidecar).map_err(encode_err)? {
        merged.extend(fields);
    }

    let bytes = serde_json::to_vec_pretty(&Value::Object(merged)).map_err(encode_err)?;
    fs.write(path, &bytes).map_err(|source| SidecarError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_sidecar<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
) -> Result<MediaMetadataSidecar, SidecarError> {
    let raw = fs.read_to_string(path).map_err(|source| SidecarError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SidecarError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn read_existing_object<F: Filesystem + ?Sized>(
    fs: &F,
    path: &Path,
) -> Result<Map<String, Value>, SidecarError> {
    let raw = match fs.read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(source) => {
            return Err(SidecarError::Io {
                action: "read",
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            warn!(path = %path.display(), "Existing sidecar is not a JSON object, replacing");
            Ok(Map::new())
        }
        Err(e) => {
            warn!(path = %path.display(), "Existing sidecar is unreadable, replacing: {e}");
            Ok(Map::new())
        }
    }
}
