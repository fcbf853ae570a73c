//! Project-level flows: scene cards, asset folders, episode bindings, and
//! backlink lookups, plus the reorder and save protocols bound to one project.

use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::Map;
use thiserror::Error;
use tracing::{debug, info, warn};

use storyme_core::{
    AssetDocumentError, AssetFields, Frontmatter, IdSource, MigrateOptions, NewAssetDocument,
    UuidIds, create_asset_document, linked_asset_ids, ordered_scene_names, parse_asset_document,
    read_manifest,
};
use storyme_types::{
    AssetId, InvalidSegment, NodeType, TargetError, normalize_episode_name, sanitize_segment,
    unique_name,
};
use storyme_utils::{Filesystem, LocalFs};

use crate::config::{ConfigError, EngineConfig};
use crate::reorder::{ReorderError, ReorderReport, reorder_scenes};
use crate::revision::{SaveError, SaveOutcome, SaveRequest, save_with_lock};

pub const ASSET_DOCUMENT_FILE: &str = "asset.md";

/// Directory levels searched below the project root for backlinks.
const MAX_WALK_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error(transparent)]
    InvalidName(#[from] InvalidSegment),
    #[error("unsupported asset type {0:?}; expected character, scene or prop")]
    UnsupportedAssetType(String),
    #[error(transparent)]
    AssetDocument(#[from] AssetDocumentError),
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> WorkspaceError + 'a {
    move |source| WorkspaceError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneCard {
    pub episode_name: String,
    pub scene_name: String,
    pub document_path: PathBuf,
    pub storyboard_dir: PathBuf,
    pub media_dir: PathBuf,
    /// False when the document already existed and was left alone.
    pub created_document: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedAsset {
    pub asset_type: NodeType,
    pub asset_id: AssetId,
    pub folder_name: String,
    pub asset_dir: PathBuf,
    pub document_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeBindings {
    pub episode_name: String,
    pub outline_path: PathBuf,
    pub script_path: PathBuf,
    pub scenes_root: PathBuf,
    pub ordered_scenes: Vec<String>,
}

/// One project on disk, with its configuration.
pub struct Workspace<F: Filesystem = LocalFs> {
    root: PathBuf,
    fs: F,
    config: EngineConfig,
    ids: Box<dyn IdSource + Send + Sync>,
}

impl<F: Filesystem + fmt::Debug> fmt::Debug for Workspace<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("fs", &self.fs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Workspace<LocalFs> {
    /// Open `root`, loading its config (or the user's, or defaults).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let config = EngineConfig::load_or_default(&root)?;
        Ok(Self::with_config(root, config))
    }

    pub fn with_config(root: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self::with_filesystem(root, config, LocalFs::new())
    }
}

impl<F: Filesystem> Workspace<F> {
    pub fn with_filesystem(root: impl Into<PathBuf>, config: EngineConfig, fs: F) -> Self {
        Self {
            root: root.into(),
            fs,
            config,
            ids: Box::new(UuidIds),
        }
    }

    #[must_use]
    pub fn with_ids(mut self, ids: impl IdSource + Send + Sync + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Create a scene's document and storage directories.
    ///
    /// An existing document is never overwritten; a new one gets `seed`, or
    /// a `# <scene>` heading.
    pub fn create_scene_card(
        &self,
        episode: &str,
        scene: &str,
        seed: Option<&str>,
    ) -> Result<SceneCard, WorkspaceError> {
        let layout = &self.config.layout;
        let episode_name = normalize_episode_name(episode)?;
        let scene_name = sanitize_segment(scene)?;
        let scenes_dir = layout.episode_scenes_dir(&self.root, &episode_name);
        let storyboard_dir = scenes_dir.join(&scene_name).join(&layout.scene_storyboard_dir);
        let media_dir = scenes_dir.join(&scene_name).join(&layout.scene_media_dir);
        let document_path = scenes_dir.join(format!("{scene_name}.md"));

        for dir in [&storyboard_dir, &media_dir] {
            self.fs
                .create_dir_all(dir)
                .map_err(io_err("create directory", dir))?;
        }

        let contents = seed.map_or_else(|| format!("# {scene_name}\n\n"), str::to_string);
        let created_document = match self.fs.write_new(&document_path, contents.as_bytes()) {
            Ok(()) => true,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => false,
            Err(source) => {
                return Err(WorkspaceError::Io {
                    action: "create scene document",
                    path: document_path,
                    source,
                });
            }
        };
        info!(
            path = %document_path.display(),
            created = created_document,
            "Scene card ready"
        );

        Ok(SceneCard {
            episode_name,
            scene_name,
            document_path,
            storyboard_dir,
            media_dir,
            created_document,
        })
    }

    /// Create `<category>/<name>/asset.md` with a fresh asset document.
    ///
    /// The folder name is deduplicated against existing sibling directories.
    pub fn create_asset(
        &self,
        asset_type: &str,
        name: &str,
        description: &str,
    ) -> Result<CreatedAsset, WorkspaceError> {
        let node: NodeType = asset_type
            .parse()
            .map_err(|_| WorkspaceError::UnsupportedAssetType(asset_type.to_string()))?;
        if !matches!(node, NodeType::Character | NodeType::Scene | NodeType::Prop) {
            return Err(WorkspaceError::UnsupportedAssetType(asset_type.to_string()));
        }

        let category_dir = self.root.join(self.config.layout.category_dir(node));
        self.fs
            .create_dir_all(&category_dir)
            .map_err(io_err("create directory", &category_dir))?;
        let siblings = self.child_dirs(&category_dir)?;
        let folder_name = unique_name(name, &siblings)?;
        let asset_dir = category_dir.join(&folder_name);
        self.fs
            .create_dir_all(&asset_dir)
            .map_err(io_err("create directory", &asset_dir))?;

        let document = create_asset_document(
            &NewAssetDocument {
                asset_type: node.as_str().to_string(),
                fields: AssetFields {
                    name: name.trim().to_string(),
                    image: String::new(),
                    description: description.to_string(),
                    custom_fields: Map::new(),
                },
                metadata: Frontmatter::new(),
            },
            &MigrateOptions {
                asset_type: None,
                updated_by: Some(self.config.documents.default_author.as_str()),
                now: Utc::now(),
                ids: &*self.ids,
            },
        )?;
        let asset_id = AssetId::new(
            parse_asset_document(&document)
                .metadata
                .get_str("asset_id")
                .unwrap_or_default(),
        );

        let document_path = asset_dir.join(ASSET_DOCUMENT_FILE);
        self.fs
            .write_new(&document_path, document.as_bytes())
            .map_err(io_err("create asset document", &document_path))?;
        info!(
            path = %document_path.display(),
            asset_id = asset_id.as_str(),
            "Created asset"
        );

        Ok(CreatedAsset {
            asset_type: node,
            asset_id,
            folder_name,
            asset_dir,
            document_path,
        })
    }

    /// Paths of an episode's outline, script and scenes, with scene order.
    ///
    /// The order manifest wins; without a readable one, scene documents are
    /// listed by name.
    pub fn episode_bindings(&self, episode: &str) -> Result<EpisodeBindings, WorkspaceError> {
        let layout = &self.config.layout;
        let episode_name = normalize_episode_name(episode)?;
        let episode_dir = layout.episode_dir(&self.root, &episode_name);
        let scenes_root = layout.episode_scenes_dir(&self.root, &episode_name);

        let ordered_scenes = match read_manifest(&self.fs, &scenes_root) {
            Ok(Some(entries)) => ordered_scene_names(&entries),
            Ok(None) => self.scene_documents(&scenes_root)?,
            Err(e) => {
                warn!(dir = %scenes_root.display(), "Ignoring scene order manifest: {e}");
                self.scene_documents(&scenes_root)?
            }
        };

        Ok(EpisodeBindings {
            outline_path: episode_dir.join(&layout.outline_file),
            script_path: episode_dir.join(&layout.script_file),
            episode_name,
            scenes_root,
            ordered_scenes,
        })
    }

    /// Markdown documents under the project root that link `asset_id`.
    ///
    /// Hidden directories (config, conflict artifacts) are not searched.
    pub fn asset_backlinks(&self, asset_id: &AssetId) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut found = Vec::new();
        let mut pending = vec![(self.root.clone(), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            let names = match self.fs.list_dir(&dir) {
                Ok(names) => names,
                Err(source) if dir == self.root => {
                    return Err(WorkspaceError::Io {
                        action: "list",
                        path: dir,
                        source,
                    });
                }
                Err(e) => {
                    warn!(dir = %dir.display(), "Skipping unreadable directory: {e}");
                    continue;
                }
            };

            for name in names {
                if name.starts_with('.') {
                    continue;
                }
                let path = dir.join(&name);
                let Ok(meta) = self.fs.metadata(&path) else {
                    continue;
                };
                if meta.is_dir() {
                    if depth < MAX_WALK_DEPTH {
                        pending.push((path, depth + 1));
                    }
                } else if name.ends_with(".md") {
                    match self.fs.read_to_string(&path) {
                        Ok(content)
                            if linked_asset_ids(&content)
                                .iter()
                                .any(|id| id == asset_id.as_str()) =>
                        {
                            found.push(path);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(path = %path.display(), "Skipping unreadable document: {e}");
                        }
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }

    pub fn reorder_scenes<S: AsRef<str>>(
        &self,
        episode: &str,
        ordered_names: &[S],
    ) -> Result<ReorderReport, ReorderError> {
        reorder_scenes(&self.fs, &self.root, &self.config.layout, episode, ordered_names)
    }

    /// Revision-checked save of a document; relative paths are taken from
    /// the project root.
    pub fn save_document(
        &self,
        path: impl AsRef<Path>,
        request: &SaveRequest,
    ) -> Result<SaveOutcome, SaveError> {
        let path = self.root.join(path);
        save_with_lock(&self.fs, &path, request, &self.config.documents)
    }

    fn child_dirs(&self, dir: &Path) -> Result<Vec<String>, WorkspaceError> {
        let names = self.fs.list_dir(dir).map_err(io_err("list", dir))?;
        Ok(names
            .into_iter()
            .filter(|name| {
                self.fs
                    .metadata(&dir.join(name))
                    .is_ok_and(|meta| meta.is_dir())
            })
            .collect())
    }

    /// `*.md` basenames in `dir`, sorted; empty when `dir` is missing.
    fn scene_documents(&self, dir: &Path) -> Result<Vec<String>, WorkspaceError> {
        let names = match self.fs.list_dir(dir) {
            Ok(names) => names,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(WorkspaceError::Io {
                    action: "list",
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };
        let mut scenes: Vec<String> = names
            .into_iter()
            .filter_map(|name| name.strip_suffix(".md").map(str::to_string))
            .collect();
        scenes.sort();
        Ok(scenes)
    }
}
