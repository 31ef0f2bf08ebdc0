//! One templating pass: fetch, extract, assemble, print.

use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use templater_comfyui::api::ComfyUIApi;
use templater_comfyui::builder::build_params;
use templater_comfyui::source::{
    FileSnapshotSource, HttpSnapshotSource, SnapshotSource, SourceError,
};
use templater_core::assembly::{assemble_param_list, parse_default_params};
use templater_core::extract::ExtractOptions;
use templater_core::graph::ExecutionGraph;
use templater_core::params::ParameterDefinition;

use crate::config::{CliConfig, SnapshotLocation};

/// Document written to stdout.
#[derive(Debug, Serialize)]
pub struct TemplateOutput {
    pub params: Vec<ParameterDefinition>,
    pub retained: Vec<String>,
    pub workflow: ExecutionGraph,
}

/// Run a full pass and print the template as pretty JSON.
pub async fn run(config: &CliConfig) -> anyhow::Result<()> {
    let output = render_template(config).await?;
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize template")?;
    println!("{json}");
    Ok(())
}

/// Produce the template document without printing it.
pub async fn render_template(config: &CliConfig) -> anyhow::Result<TemplateOutput> {
    let source = snapshot_source(&config.snapshot)?;
    let options = ExtractOptions {
        available_models: resolve_models(config).await,
        fixed_checkpoint_node_id: config.fixed_checkpoint_node_id.clone(),
    };

    let defaults = match &config.default_params_path {
        Some(path) => load_defaults(path).await?,
        None => Vec::new(),
    };

    tracing::info!(
        source = %source.describe(),
        models = options.available_models.len(),
        defaults = defaults.len(),
        "Building parameter template",
    );

    let extraction = build_params(source.as_ref(), &options)
        .await
        .with_context(|| format!("Failed to build template from {}", source.describe()))?;

    let params = assemble_param_list(&extraction, &defaults);

    tracing::info!(
        params = params.len(),
        retained = extraction.retained.len(),
        "Template built",
    );

    Ok(TemplateOutput {
        params,
        retained: extraction.retained,
        workflow: extraction.graph,
    })
}

fn snapshot_source(location: &SnapshotLocation) -> Result<Box<dyn SnapshotSource>, SourceError> {
    let source: Box<dyn SnapshotSource> = match location {
        SnapshotLocation::File(path) => Box::new(FileSnapshotSource::new(path.clone())),
        SnapshotLocation::Url(url) => Box::new(HttpSnapshotSource::from_url(url)?),
    };
    Ok(source)
}

/// Ask ComfyUI for its checkpoints, falling back to `MODEL_NAMES`.
async fn resolve_models(config: &CliConfig) -> Vec<String> {
    let Some(api_url) = &config.comfyui_api_url else {
        return config.model_names.clone();
    };

    match ComfyUIApi::new(api_url.clone()).list_checkpoints().await {
        Ok(models) => models,
        Err(e) => {
            tracing::warn!(
                api_url = %api_url,
                error = %e,
                fallback = config.model_names.len(),
                "Checkpoint listing failed, using configured model names",
            );
            config.model_names.clone()
        }
    }
}

/// Read the baseline parameter set from disk.
pub async fn load_defaults(path: &Path) -> anyhow::Result<Vec<ParameterDefinition>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read default params from {}", path.display()))?;
    Ok(parse_default_params(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn config_for(snapshot: &Path, defaults: Option<PathBuf>) -> CliConfig {
        CliConfig {
            snapshot: SnapshotLocation::File(snapshot.to_path_buf()),
            comfyui_api_url: None,
            model_names: vec!["base.safetensors".to_string()],
            default_params_path: defaults,
            fixed_checkpoint_node_id: "4".to_string(),
        }
    }

    fn snapshot() -> serde_json::Value {
        json!({
            "workflow": { "nodes": [], "links": [] },
            "output": {
                "3": {
                    "inputs": { "seed": 7, "model": ["4", 0] },
                    "class_type": "KSampler"
                }
            }
        })
    }

    #[tokio::test]
    async fn renders_template_with_retained_defaults_first() {
        let snap = write_temp(&snapshot().to_string());
        let defaults = write_temp(
            &json!([
                { "id": "prompt", "name": "Prompt", "type": "text" },
                { "id": "seed", "name": "Seed", "type": "integer", "default": 1 }
            ])
            .to_string(),
        );

        let output = render_template(&config_for(snap.path(), Some(defaults.path().into())))
            .await
            .unwrap();

        let ids: Vec<&str> = output.params.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["comfyworkflowraw", "seed"]);
        assert!(output.params[0].extra_hidden);
        assert_eq!(output.retained, vec!["images", "model", "seed"]);
        assert_eq!(
            output.workflow.get("3").unwrap().inputs["seed"],
            json!("%%_COMFYFIXME_${seed+seed:7}_ENDFIXME_%%")
        );
    }

    #[tokio::test]
    async fn missing_snapshot_file_fails() {
        let config = config_for(Path::new("/not/here.json"), None);
        assert!(render_template(&config).await.is_err());
    }

    #[tokio::test]
    async fn unparseable_snapshot_url_fails() {
        let config = CliConfig {
            snapshot: SnapshotLocation::Url("localhost/snapshot".to_string()),
            ..config_for(Path::new("unused.json"), None)
        };
        let err = render_template(&config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid snapshot URL"));
    }

    #[tokio::test]
    async fn invalid_defaults_fail() {
        let defaults = write_temp("{}");
        assert!(load_defaults(defaults.path()).await.is_err());
    }

    #[tokio::test]
    async fn models_fall_back_without_api_url() {
        let snap = write_temp(&snapshot().to_string());
        let config = config_for(snap.path(), None);
        assert_eq!(resolve_models(&config).await, vec!["base.safetensors"]);
    }
}
