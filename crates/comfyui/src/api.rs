//! REST API client for the ComfyUI HTTP endpoints the templater needs.
//!
//! Wraps node introspection (`/object_info`) to read the list of
//! checkpoint models installed on a ComfyUI server, using [`reqwest`].

use serde::de::DeserializeOwned;

/// Node class whose `ckpt_name` input enumerates installed checkpoints.
const CHECKPOINT_LOADER_CLASS: &str = "CheckpointLoaderSimple";

/// Input name holding the checkpoint enumeration.
const CHECKPOINT_INPUT: &str = "ckpt_name";

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// List checkpoint model names available on the server.
    ///
    /// Sends `GET /object_info/CheckpointLoaderSimple` and reads the
    /// `ckpt_name` enumeration from the node's required inputs.
    pub async fn list_checkpoints(&self) -> Result<Vec<String>, ComfyUIApiError> {
        let info: serde_json::Value = self
            .get_json(&format!("object_info/{CHECKPOINT_LOADER_CLASS}"))
            .await?;
        let models = parse_checkpoint_names(&info);
        tracing::info!(
            api_url = %self.api_url,
            count = models.len(),
            "Fetched checkpoint list from ComfyUI",
        );
        Ok(models)
    }

    /// GET an arbitrary JSON document relative to the API base URL.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/{}", self.api_url, path.trim_start_matches('/')))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    pub(crate) async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Read checkpoint names out of an `/object_info` response.
///
/// Handles both enumeration layouts ComfyUI has shipped:
/// `[["a.safetensors", ...], {...}]` and `["COMBO", {"options": [...]}]`.
/// Anything else yields an empty list.
pub fn parse_checkpoint_names(info: &serde_json::Value) -> Vec<String> {
    let Some(spec) = info
        .get(CHECKPOINT_LOADER_CLASS)
        .and_then(|node| node.get("input"))
        .and_then(|input| input.get("required"))
        .and_then(|required| required.get(CHECKPOINT_INPUT))
        .and_then(|spec| spec.as_array())
    else {
        return Vec::new();
    };

    let names = match spec.first() {
        Some(serde_json::Value::Array(names)) => Some(names),
        Some(serde_json::Value::String(kind)) if kind == "COMBO" => spec
            .get(1)
            .and_then(|opts| opts.get("options"))
            .and_then(|opts| opts.as_array()),
        _ => None,
    };

    names
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_legacy_enumeration_layout() {
        let info = json!({
            "CheckpointLoaderSimple": {
                "input": { "required": {
                    "ckpt_name": [["a.safetensors", "b.ckpt"], { "tooltip": "x" }]
                } }
            }
        });
        assert_eq!(parse_checkpoint_names(&info), vec!["a.safetensors", "b.ckpt"]);
    }

    #[test]
    fn parses_combo_layout() {
        let info = json!({
            "CheckpointLoaderSimple": {
                "input": { "required": {
                    "ckpt_name": ["COMBO", { "options": ["sdxl.safetensors"] }]
                } }
            }
        });
        assert_eq!(parse_checkpoint_names(&info), vec!["sdxl.safetensors"]);
    }

    #[test]
    fn unexpected_shapes_yield_empty_list() {
        assert!(parse_checkpoint_names(&json!({})).is_empty());
        assert!(parse_checkpoint_names(&json!({
            "CheckpointLoaderSimple": { "input": { "required": { "ckpt_name": "x" } } }
        }))
        .is_empty());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = ComfyUIApi::new("http://host:8188/".to_string());
        assert_eq!(api.api_url(), "http://host:8188");
    }
}
