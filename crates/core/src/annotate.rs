//! Pre-scan of the visual graph.
//!
//! Builds two lookups consumed by the extraction rules:
//!
//! - display labels for nodes and node fields, taken from user titles and
//!   from recognising prompt encoders wired into a sampler's
//!   `positive`/`negative` input;
//! - redirects from an execution-graph field to the identifier of the
//!   titled primitive node that feeds it.

use std::collections::HashMap;

use crate::graph::{class_types, reference, ExecutionGraph, VisualGraph};
use crate::naming::{clean_param_name, unique_id, RAW_INPUT_PREFIX};

/// Label assigned to a node feeding slot 0 of a `positive` input.
pub const POSITIVE_PROMPT_LABEL: &str = "Positive Prompt";

/// Label assigned to a node feeding slot 0 of a `negative` input.
pub const NEGATIVE_PROMPT_LABEL: &str = "Negative Prompt";

/// Identifier contributed by a titled primitive node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Namespaced, cleaned and deduplicated identifier.
    pub id: String,
    /// The primitive's title as the user typed it.
    pub title: String,
}

/// Label and redirect lookups for one snapshot.
#[derive(Debug, Default)]
pub struct Annotations {
    /// `"{node}"` or `"{node}.{field}"` to display label.
    labels: HashMap<String, String>,
    /// `"{node}.{field}"` to `"{node}.{slot_index}"`.
    label_paths: HashMap<String, String>,
    /// `"{node}.{slot_index}"` to the primitive feeding it.
    redirects: HashMap<String, Redirect>,
}

impl Annotations {
    pub fn build(visual: &VisualGraph, graph: &ExecutionGraph) -> Self {
        let mut annotations = Self::default();
        annotations.collect_titles(visual);
        annotations.collect_primitives(visual);
        annotations.collect_input_paths(visual);
        annotations.collect_prompt_encoders(graph);

        tracing::debug!(
            labels = annotations.labels.len(),
            redirects = annotations.redirects.len(),
            "Annotated visual graph",
        );
        annotations
    }

    /// Display label for a node, if it has one.
    pub fn node_label(&self, node_id: &str) -> Option<&str> {
        self.labels.get(node_id).map(String::as_str)
    }

    /// Display label for one field of a node, if it has one.
    pub fn field_label(&self, node_id: &str, field: &str) -> Option<&str> {
        self.labels
            .get(&format!("{node_id}.{field}"))
            .map(String::as_str)
    }

    /// The primitive redirect for a field, resolved through the field's
    /// positional slot in the visual graph.
    pub fn redirect_for(&self, node_id: &str, field: &str) -> Option<&Redirect> {
        let path = self.label_paths.get(&format!("{node_id}.{field}"))?;
        self.redirects.get(path)
    }

    /// Every identifier a primitive redirect will claim.
    pub fn redirect_ids(&self) -> impl Iterator<Item = &str> {
        self.redirects.values().map(|r| r.id.as_str())
    }

    fn collect_titles(&mut self, visual: &VisualGraph) {
        for node in &visual.nodes {
            if let (Some(key), Some(title)) = (node.key(), node.title()) {
                self.labels.insert(key, title.to_string());
            }
        }
    }

    fn collect_primitives(&mut self, visual: &VisualGraph) {
        let links: Vec<_> = visual.links().collect();
        let mut used: Vec<String> = Vec::new();

        for node in &visual.nodes {
            if node.node_type != class_types::PRIMITIVE_NODE {
                continue;
            }
            let (Some(key), Some(title)) = (node.key(), node.title()) else {
                continue;
            };

            let base = format!("{RAW_INPUT_PREFIX}{}", clean_param_name(title));
            let id = unique_id(&base, |candidate| used.iter().any(|u| u == candidate));
            used.push(id.clone());

            for link in links.iter().filter(|l| l.from_node == key) {
                self.redirects.insert(
                    format!("{}.{}", link.to_node, link.to_slot),
                    Redirect {
                        id: id.clone(),
                        title: title.to_string(),
                    },
                );
            }
        }
    }

    fn collect_input_paths(&mut self, visual: &VisualGraph) {
        for node in &visual.nodes {
            let (Some(key), Some(inputs)) = (node.key(), node.inputs.as_ref()) else {
                continue;
            };
            let node_label = self.labels.get(&key).cloned();
            for (index, input) in inputs.iter().enumerate() {
                let field_key = format!("{key}.{}", input.name);
                self.label_paths
                    .insert(field_key.clone(), format!("{key}.{index}"));
                if let Some(label) = &node_label {
                    self.labels.insert(field_key, label.clone());
                }
            }
        }
    }

    fn collect_prompt_encoders(&mut self, graph: &ExecutionGraph) {
        for (_, node) in graph.nodes() {
            for (field, value) in &node.inputs {
                let label = match field.as_str() {
                    "negative" => NEGATIVE_PROMPT_LABEL,
                    "positive" => POSITIVE_PROMPT_LABEL,
                    _ => continue,
                };
                if let Some((source, 0)) = reference(value) {
                    self.labels.insert(source, label.to_string());
                }
            }
        }
    }
}
