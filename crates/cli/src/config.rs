use std::path::PathBuf;

use templater_core::extract::DEFAULT_FIXED_CHECKPOINT_NODE_ID;

/// Where the snapshot is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotLocation {
    File(PathBuf),
    Url(String),
}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub snapshot: SnapshotLocation,
    /// ComfyUI base URL used to list installed checkpoints.
    pub comfyui_api_url: Option<String>,
    /// Model names used when no API URL is set or the API call fails.
    pub model_names: Vec<String>,
    /// JSON array of baseline parameter definitions.
    pub default_params_path: Option<PathBuf>,
    pub fixed_checkpoint_node_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("one of SNAPSHOT_PATH or SNAPSHOT_URL must be set")]
    MissingSnapshot,

    #[error("SNAPSHOT_PATH and SNAPSHOT_URL are mutually exclusive")]
    ConflictingSnapshot,
}

impl CliConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `SNAPSHOT_PATH`            | --      |
    /// | `SNAPSHOT_URL`             | --      |
    /// | `COMFYUI_API_URL`          | --      |
    /// | `MODEL_NAMES`              | empty   |
    /// | `DEFAULT_PARAMS_PATH`      | --      |
    /// | `FIXED_CHECKPOINT_NODE_ID` | `4`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let snapshot = match (var("SNAPSHOT_PATH"), var("SNAPSHOT_URL")) {
            (Some(path), None) => SnapshotLocation::File(PathBuf::from(path)),
            (None, Some(url)) => SnapshotLocation::Url(url),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingSnapshot),
            (None, None) => return Err(ConfigError::MissingSnapshot),
        };

        let model_names: Vec<String> = var("MODEL_NAMES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            snapshot,
            comfyui_api_url: var("COMFYUI_API_URL"),
            model_names,
            default_params_path: var("DEFAULT_PARAMS_PATH").map(PathBuf::from),
            fixed_checkpoint_node_id: var("FIXED_CHECKPOINT_NODE_ID")
                .unwrap_or_else(|| DEFAULT_FIXED_CHECKPOINT_NODE_ID.to_string()),
        })
    }
}
