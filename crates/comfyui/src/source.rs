//! Where editor snapshots come from.
//!
//! The editor surface answers one asynchronous request with the visual
//! graph and the compiled execution graph. [`SnapshotSource`] models that
//! request; a failed fetch is reported as [`SourceError`] and extraction
//! is never attempted.

use std::path::PathBuf;

use async_trait::async_trait;
use templater_core::error::CoreError;
use templater_core::graph::{parse_snapshot, EditorSnapshot};

use crate::api::{ComfyUIApi, ComfyUIApiError};

/// Errors raised while fetching a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The editor surface did not load or is not reachable.
    #[error("Workflow editor unavailable: {0}")]
    EditorUnavailable(String),

    /// The snapshot URL could not be parsed.
    #[error("Invalid snapshot URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The snapshot file could not be read.
    #[error("Failed to read snapshot from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document was not valid JSON.
    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was JSON but not a usable snapshot.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Api(#[from] ComfyUIApiError),
}

/// A single-shot provider of `{workflow, output}` snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot.
    async fn fetch(&self) -> Result<EditorSnapshot, SourceError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Reads a snapshot document from disk.
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn fetch(&self) -> Result<EditorSnapshot, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let json: serde_json::Value = serde_json::from_str(&text)?;
        Ok(parse_snapshot(&json)?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches a snapshot document over HTTP.
pub struct HttpSnapshotSource {
    api: ComfyUIApi,
    path: String,
}

impl HttpSnapshotSource {
    /// * `base_url` - server base URL, e.g. `http://host:8188`.
    /// * `path`     - path of the snapshot document relative to `base_url`.
    pub fn new(base_url: String, path: impl Into<String>) -> Self {
        Self {
            api: ComfyUIApi::new(base_url),
            path: path.into(),
        }
    }

    /// Split a full URL into origin and path (plus query).
    pub fn from_url(url: &str) -> Result<Self, SourceError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| SourceError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SourceError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let mut path = parsed.path().trim_start_matches('/').to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self::new(parsed.origin().ascii_serialization(), path))
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<EditorSnapshot, SourceError> {
        let json: serde_json::Value = self.api.get_json(&self.path).await.map_err(|e| match e {
            ComfyUIApiError::Request(err) if err.is_connect() || err.is_timeout() => {
                SourceError::EditorUnavailable(err.to_string())
            }
            other => SourceError::Api(other),
        })?;
        Ok(parse_snapshot(&json)?)
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.api.api_url(), self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_url_splits_base_and_path() {
        let source = HttpSnapshotSource::from_url("http://host:8188/templater/snapshot").unwrap();
        assert_eq!(source.describe(), "http://host:8188/templater/snapshot");
        assert_eq!(source.path, "templater/snapshot");
    }

    #[test]
    fn from_url_without_path() {
        let source = HttpSnapshotSource::from_url("http://host:8188").unwrap();
        assert_eq!(source.path, "");
        assert_eq!(source.api.api_url(), "http://host:8188");
    }

    #[test]
    fn from_url_keeps_query() {
        let source = HttpSnapshotSource::from_url("https://host/api/snapshot?editor=2").unwrap();
        assert_eq!(source.api.api_url(), "https://host");
        assert_eq!(source.path, "api/snapshot?editor=2");
    }

    #[test]
    fn from_url_rejects_relative_url() {
        assert!(matches!(
            HttpSnapshotSource::from_url("host:8188/snapshot"),
            Err(SourceError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HttpSnapshotSource::from_url("/snapshot"),
            Err(SourceError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn file_source_describes_path() {
        let source = FileSnapshotSource::new("/tmp/snapshot.json");
        assert_eq!(source.describe(), "file /tmp/snapshot.json");
    }
}
