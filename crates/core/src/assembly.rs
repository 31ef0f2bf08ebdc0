//! Final parameter list handed to the renderer.
//!
//! Order is fixed: the raw graph parameter (flagged hidden), then every
//! baseline parameter whose id was retained, in the baseline's own order,
//! then the extracted parameters in insertion order.

use crate::error::CoreError;
use crate::extract::Extraction;
use crate::params::{ParameterDefinition, RAW_GRAPH_PARAM_ID};

/// Merge an extraction with the baseline parameter set.
pub fn assemble_param_list(
    extraction: &Extraction,
    defaults: &[ParameterDefinition],
) -> Vec<ParameterDefinition> {
    let mut list = Vec::with_capacity(extraction.params.len() + extraction.retained.len());

    if let Some(raw) = extraction.raw_graph_param() {
        list.push(ParameterDefinition {
            extra_hidden: true,
            ..raw.clone()
        });
    }

    list.extend(
        defaults
            .iter()
            .filter(|p| extraction.retained.iter().any(|id| id == &p.id))
            .cloned(),
    );

    list.extend(
        extraction
            .params
            .values()
            .filter(|p| p.id != RAW_GRAPH_PARAM_ID)
            .cloned(),
    );

    list
}

/// Parse a baseline parameter set from a JSON array.
pub fn parse_default_params(json: &str) -> Result<Vec<ParameterDefinition>, CoreError> {
    serde_json::from_str(json)
        .map_err(|e| CoreError::Validation(format!("Invalid default parameter list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_params, ExtractOptions};
    use crate::graph::{ExecutionGraph, PromptNode, VisualGraph};
    use serde_json::json;

    fn defaults() -> Vec<ParameterDefinition> {
        parse_default_params(
            r#"[
                { "id": "prompt", "name": "Prompt", "type": "text" },
                { "id": "images", "name": "Images", "type": "integer" },
                { "id": "aspectratio", "name": "Aspect Ratio", "type": "dropdown" },
                { "id": "seed", "name": "Seed", "type": "integer" },
                { "id": "model", "name": "Model", "type": "model" }
            ]"#,
        )
        .unwrap()
    }

    fn extraction() -> Extraction {
        let mut graph = ExecutionGraph::new();
        graph.insert(
            "3",
            PromptNode::new("KSampler")
                .with_input("seed", json!(1))
                .with_input("denoise", json!(0.5)),
        );
        extract_params(&VisualGraph::default(), graph, &ExtractOptions::default())
    }

    #[test]
    fn raw_graph_first_then_retained_defaults_then_extracted() {
        let list = assemble_param_list(&extraction(), &defaults());
        let ids: Vec<_> = list.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "comfyworkflowraw",
                "images",
                "seed",
                "model",
                "comfyrawworkflowinputksamplernode3denoise",
            ]
        );
        assert!(list[0].extra_hidden);
        assert!(!list[0].visible);
    }

    #[test]
    fn invalid_default_list_is_rejected() {
        let err = parse_default_params("{}").unwrap_err().to_string();
        assert!(err.contains("Invalid default parameter list"));
    }
}
