//! Ingest target resolution.
//!
//! A [`TargetDescriptor`] is what callers send ("put these files on the
//! character shelf", "attach these to scene 3 of EP02"). [`ProjectLayout`]
//! turns it into an [`IngestTarget`]: the directory that receives the files
//! and, for scene cards, the markdown document that receives backlinks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::segment::{InvalidSegment, sanitize_segment};

/// Canonical node types an ingest can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Assets,
    Character,
    Scene,
    Prop,
    Episode,
    SceneCard,
}

impl NodeType {
    pub const ALIASES: &'static [(&'static str, NodeType)] = &[
        ("assets", NodeType::Assets),
        ("asset", NodeType::Assets),
        ("资产", NodeType::Assets),
        ("character", NodeType::Character),
        ("characters", NodeType::Character),
        ("角色", NodeType::Character),
        ("scene", NodeType::Scene),
        ("scenes", NodeType::Scene),
        ("场景", NodeType::Scene),
        ("prop", NodeType::Prop),
        ("props", NodeType::Prop),
        ("道具", NodeType::Prop),
        ("episode", NodeType::Episode),
        ("ep", NodeType::Episode),
        ("scene-card", NodeType::SceneCard),
        ("scene_card", NodeType::SceneCard),
        ("scenecard", NodeType::SceneCard),
        ("场次", NodeType::SceneCard),
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeType::Assets => "assets",
            NodeType::Character => "character",
            NodeType::Scene => "scene",
            NodeType::Prop => "prop",
            NodeType::Episode => "episode",
            NodeType::SceneCard => "scene_card",
        }
    }

    /// Asset categories live under the assets root and need no episode.
    #[must_use]
    pub const fn is_asset_category(self) -> bool {
        matches!(
            self,
            NodeType::Assets | NodeType::Character | NodeType::Scene | NodeType::Prop
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = TargetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TargetError::MissingNodeType);
        }
        let lower = trimmed.to_lowercase();
        Self::ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, node)| *node)
            .ok_or_else(|| TargetError::UnsupportedTarget {
                node_type: trimmed.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("target node type is required")]
    MissingNodeType,
    #[error("unsupported ingest target node type: {node_type}")]
    UnsupportedTarget { node_type: String },
    #[error("{node_type} target requires an episode")]
    MissingEpisode { node_type: NodeType },
    #[error("scene card target requires a scene name")]
    MissingScene,
    #[error("invalid episode name: {raw:?}")]
    InvalidEpisodeName { raw: String },
    #[error(transparent)]
    InvalidSegment(#[from] InvalidSegment),
}

/// Normalize an episode identifier to `EPnn`.
///
/// Accepts `EP3`, `ep03`, `3` and `03`. Digits after an `EP` prefix are kept
/// as written and only padded to two places, so `EP003` stays `EP003`; a bare
/// number is reformatted. Zero is rejected in either form, as are negative and
/// non-numeric identifiers.
///
/// ```
/// use storyme_types::normalize_episode_name;
///
/// assert_eq!(normalize_episode_name("ep3").unwrap(), "EP03");
/// assert_eq!(normalize_episode_name("12").unwrap(), "EP12");
/// assert!(normalize_episode_name("pilot").is_err());
/// ```
pub fn normalize_episode_name(raw: &str) -> Result<String, TargetError> {
    let invalid = || TargetError::InvalidEpisodeName {
        raw: raw.to_string(),
    };

    let upper = raw.trim().to_uppercase();
    let (digits, prefixed) = match upper.strip_prefix("EP") {
        Some(rest) => (rest, true),
        None => (upper.as_str(), false),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if digits.chars().all(|c| c == '0') {
        return Err(invalid());
    }
    if prefixed {
        return Ok(format!("EP{digits:0>2}"));
    }
    let number: u64 = digits.parse().map_err(|_| invalid())?;
    Ok(format!("EP{number:02}"))
}

/// Caller-facing description of where an ingest should land.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
}

impl TargetDescriptor {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            episode: None,
            scene: None,
        }
    }

    #[must_use]
    pub fn with_episode(mut self, episode: impl Into<String>) -> Self {
        self.episode = Some(episode.into());
        self
    }

    #[must_use]
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }
}

/// A resolved ingest destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestTarget {
    pub node_type: NodeType,
    pub base_path: PathBuf,
    pub companion_document_path: Option<PathBuf>,
    /// `/`-separated path of the node relative to the project root.
    pub logical_path: String,
}

/// Directory names used inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectLayout {
    pub assets_dir: String,
    pub characters_dir: String,
    pub scenes_dir: String,
    pub props_dir: String,
    pub script_dir: String,
    pub episode_resources_dir: String,
    pub episode_scenes_dir: String,
    pub scene_media_dir: String,
    pub scene_storyboard_dir: String,
    pub outline_file: String,
    pub script_file: String,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            assets_dir: "assets".to_string(),
            characters_dir: "characters".to_string(),
            scenes_dir: "scenes".to_string(),
            props_dir: "props".to_string(),
            script_dir: "script".to_string(),
            episode_resources_dir: "resources".to_string(),
            episode_scenes_dir: "scenes".to_string(),
            scene_media_dir: "media".to_string(),
            scene_storyboard_dir: "storyboard".to_string(),
            outline_file: "outline.md".to_string(),
            script_file: "script.md".to_string(),
        }
    }
}

impl ProjectLayout {
    /// Relative directory segments for an asset category.
    fn category_segments(&self, node: NodeType) -> Vec<&str> {
        match node {
            NodeType::Character => vec![self.assets_dir.as_str(), self.characters_dir.as_str()],
            NodeType::Scene => vec![self.assets_dir.as_str(), self.scenes_dir.as_str()],
            NodeType::Prop => vec![self.assets_dir.as_str(), self.props_dir.as_str()],
            _ => vec![self.assets_dir.as_str()],
        }
    }

    /// Relative path of an asset category directory.
    #[must_use]
    pub fn category_dir(&self, node: NodeType) -> PathBuf {
        self.category_segments(node).iter().collect()
    }

    /// `<root>/<script>/<EPnn>`.
    #[must_use]
    pub fn episode_dir(&self, project_root: &Path, episode: &str) -> PathBuf {
        project_root.join(&self.script_dir).join(episode)
    }

    /// `<root>/<script>/<EPnn>/<scenes>`.
    #[must_use]
    pub fn episode_scenes_dir(&self, project_root: &Path, episode: &str) -> PathBuf {
        self.episode_dir(project_root, episode)
            .join(&self.episode_scenes_dir)
    }

    /// Resolve a descriptor against `project_root`.
    ///
    /// Pure path computation: nothing is created or checked on disk.
    pub fn resolve_target(
        &self,
        project_root: &Path,
        target: &TargetDescriptor,
    ) -> Result<IngestTarget, TargetError> {
        let node_type: NodeType = target.node_type.parse()?;

        if node_type.is_asset_category() {
            let segments = self.category_segments(node_type);
            return Ok(IngestTarget {
                node_type,
                base_path: segments.iter().fold(project_root.to_path_buf(), |p, s| p.join(s)),
                companion_document_path: None,
                logical_path: segments.join("/"),
            });
        }

        let episode = target
            .episode
            .as_deref()
            .ok_or(TargetError::MissingEpisode { node_type })?;
        let episode = normalize_episode_name(episode)?;

        if node_type == NodeType::Episode {
            let logical = [
                self.script_dir.as_str(),
                episode.as_str(),
                self.episode_resources_dir.as_str(),
            ];
            return Ok(IngestTarget {
                node_type,
                base_path: self
                    .episode_dir(project_root, &episode)
                    .join(&self.episode_resources_dir),
                companion_document_path: None,
                logical_path: logical.join("/"),
            });
        }

        let scene = target.scene.as_deref().ok_or(TargetError::MissingScene)?;
        let scene = sanitize_segment(scene)?;
        let scenes_dir = self.episode_scenes_dir(project_root, &episode);
        let logical = [
            self.script_dir.as_str(),
            episode.as_str(),
            self.episode_scenes_dir.as_str(),
            scene.as_str(),
        ];
        Ok(IngestTarget {
            node_type,
            base_path: scenes_dir.join(&scene).join(&self.scene_media_dir),
            companion_document_path: Some(scenes_dir.join(format!("{scene}.md"))),
            logical_path: logical.join("/"),
        })
    }
}

/// Resolve with the default [`ProjectLayout`].
pub fn resolve_target(
    project_root: &Path,
    target: &TargetDescriptor,
) -> Result<IngestTarget, TargetError> {
    ProjectLayout::default().resolve_target(project_root, target)
}
