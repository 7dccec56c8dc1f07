use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Errors from loading an [`EntityRendererConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for the entity renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityRendererConfig {
    /// Seconds a procedural material takes to fade in.
    pub fade_duration_secs: f32,
    /// Start an enter fade when a renderer is added, if the entity asks for one.
    pub fade_on_add: bool,
    /// Window after a remote edit during which the indicator shows "fresh".
    pub remote_edit_threshold_secs: f32,
    /// Window after a broadcast during which the indicator shows "fresh".
    pub broadcast_threshold_secs: f32,
    /// Nested mirror passes the debug traversal follows.
    pub max_mirror_depth: u32,
}

impl Default for EntityRendererConfig {
    fn default() -> Self {
        Self {
            fade_duration_secs: 1.0,
            fade_on_add: true,
            remote_edit_threshold_secs: 0.2,
            broadcast_threshold_secs: 0.4,
            max_mirror_depth: 1,
        }
    }
}

impl EntityRendererConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), ?config, "renderer config loaded");
        Ok(config)
    }
}
