//! Engine configuration (`.storyme/config.toml`).
//!
//! Looked up in the project first, then in the user's home directory. Every
//! field is optional; a missing file means defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use storyme_core::DEFAULT_AUTHOR;
use storyme_types::ProjectLayout;

use crate::ingest::IngestMode;

pub const CONFIG_DIR: &str = ".storyme";
pub const CONFIG_FILE: &str = "config.toml";

fn default_conflicts_dir() -> String {
    ".conflicts".to_string()
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: ProjectLayout,
    pub ingest: IngestConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Mode used when a request does not name one.
    pub default_mode: IngestMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentsConfig {
    /// Sibling directory receiving save-conflict artifacts.
    #[serde(default = "default_conflicts_dir")]
    pub conflicts_dir: String,
    /// Author recorded when a save does not name one.
    #[serde(default = "default_author")]
    pub default_author: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            conflicts_dir: default_conflicts_dir(),
            default_author: default_author(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl EngineConfig {
    /// Load a specific config file. `Ok(None)` when it does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Project config if present, else the user config, else `Ok(None)`.
    pub fn load_for_project(project_root: &Path) -> Result<Option<Self>, ConfigError> {
        if let Some(config) = Self::load_from(&project_config_path(project_root))? {
            return Ok(Some(config));
        }
        match user_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Like [`EngineConfig::load_for_project`], falling back to defaults.
    pub fn load_or_default(project_root: &Path) -> Result<Self, ConfigError> {
        Ok(Self::load_for_project(project_root)?.unwrap_or_default())
    }
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join(CONFIG_FILE)
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}
