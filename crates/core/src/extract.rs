//! The extraction pass: editor snapshot in, parameter template out.
//!
//! Every execution-graph node is visited in insertion order. For each node
//! the paired latent-size rule, the sampler claim rules and the prompt
//! rules run first; any field still holding a raw scalar then goes through
//! the generic classifier. A claimed field is rewritten to exactly one
//! placeholder and never touched again.

use indexmap::IndexMap;
use serde::Serialize;

use crate::annotate::{Annotations, Redirect};
use crate::classify::{classify, Classification};
use crate::graph::{class_types, EditorSnapshot, ExecutionGraph, PromptNode, VisualGraph};
use crate::naming::{clean_param_name, number_to_letters, unique_id, RAW_INPUT_PREFIX};
use crate::params::{
    ParamGroup, ParamRegistry, ParameterDefinition, RAW_GRAPH_GROUP_ID, RAW_GRAPH_PARAM_ID,
};
use crate::placeholder::{self, is_placeholder};
use crate::rules::{
    is_skipped_field, ClaimRule, ASPECT_RATIO_PARAM, CLAIM_RULES, PAIRED_RULES, PROMPT_RULES,
    PROMPT_TEXT_FIELD,
};

/// Node id of the checkpoint loader in ComfyUI's stock workflow.
pub const DEFAULT_FIXED_CHECKPOINT_NODE_ID: &str = "4";

/// Group holding parameters contributed by titled primitive nodes.
pub const PRIMITIVES_GROUP_ID: &str = "primitives";

pub const PRIMITIVES_GROUP_NAME: &str = "Primitives";

/// Inputs the extraction needs besides the snapshot itself.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Model names offered for non-default checkpoint loaders.
    pub available_models: Vec<String>,
    /// Checkpoint loader whose model is always supplied by the baseline
    /// `model` parameter.
    pub fixed_checkpoint_node_id: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            available_models: Vec::new(),
            fixed_checkpoint_node_id: DEFAULT_FIXED_CHECKPOINT_NODE_ID.to_string(),
        }
    }
}

/// Result of one extraction pass.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    /// Parameters in insertion order; the raw graph parameter is first.
    pub params: IndexMap<String, ParameterDefinition>,
    /// The execution graph with claimed fields rewritten.
    pub graph: ExecutionGraph,
    /// Baseline parameter ids that stay active, without duplicates.
    pub retained: Vec<String>,
}

impl Extraction {
    pub fn raw_graph_param(&self) -> Option<&ParameterDefinition> {
        self.params.get(RAW_GRAPH_PARAM_ID)
    }
}

/// Run extraction on a full snapshot.
pub fn extract_snapshot(snapshot: EditorSnapshot, options: &ExtractOptions) -> Extraction {
    extract_params(&snapshot.workflow, snapshot.output, options)
}

/// Convert an execution graph into a parameter template.
///
/// Takes ownership of `graph` and returns it rewritten inside the
/// [`Extraction`].
pub fn extract_params(
    visual: &VisualGraph,
    mut graph: ExecutionGraph,
    options: &ExtractOptions,
) -> Extraction {
    let annotations = Annotations::build(visual, &graph);
    let mut registry = ParamRegistry::new();
    for id in annotations.redirect_ids() {
        registry.reserve(id);
    }
    let mut group_ids = vec![PRIMITIVES_GROUP_ID.to_string(), RAW_GRAPH_GROUP_ID.to_string()];

    for (node_id, node) in graph.nodes_mut() {
        let group = node_group(node_id, &node.class_type, &annotations, &mut group_ids);
        NodePass {
            node_id,
            node,
            group,
            annotations: &annotations,
            registry: &mut registry,
            options,
        }
        .run();
    }

    let (params, retained) = registry.finish_with_raw_graph(&graph);
    tracing::info!(
        nodes = graph.len(),
        params = params.len(),
        retained = retained.len(),
        "Extracted workflow parameters",
    );

    Extraction {
        params,
        graph,
        retained,
    }
}

/// Group for a node, keyed by its cleaned display label.
fn node_group(
    node_id: &str,
    class_type: &str,
    annotations: &Annotations,
    used: &mut Vec<String>,
) -> ParamGroup {
    let display = annotations.node_label(node_id).unwrap_or(class_type);
    let label = format!("{display} (Node {node_id})");

    let base = clean_param_name(display);
    let id = if used.contains(&base) {
        let suffixed = match node_id.parse::<u64>() {
            Ok(n) => format!("{base}{}", number_to_letters(n)),
            Err(_) => base,
        };
        unique_id(&suffixed, |candidate| used.iter().any(|u| u == candidate))
    } else {
        base
    };
    used.push(id.clone());

    let priority = group_priority(&label);
    ParamGroup::new(id, label, priority)
}

fn group_priority(label: &str) -> f64 {
    if label.contains("Prompt") {
        -10.0
    } else if label.contains("EmptyLatent") {
        -7.0
    } else if label.contains("KSampler") {
        -5.0
    } else {
        0.0
    }
}

/// Where a claimed field's parameter id comes from.
enum Target {
    /// A primitive redirect; one parameter shared by every field it feeds.
    Shared { id: String, label: String },
    /// A generic id, made unique per field.
    Fresh { base: String, label: String },
}

impl Target {
    fn redirect(redirect: &Redirect) -> Self {
        Self::Shared {
            id: redirect.id.clone(),
            label: redirect.title.clone(),
        }
    }
}

struct NodePass<'a> {
    node_id: &'a str,
    node: &'a mut PromptNode,
    group: ParamGroup,
    annotations: &'a Annotations,
    registry: &'a mut ParamRegistry,
    options: &'a ExtractOptions,
}

impl NodePass<'_> {
    fn run(&mut self) {
        if self.claim_paired() {
            return;
        }
        for rule in CLAIM_RULES {
            self.claim(rule);
        }
        if self.claim_prompt() {
            return;
        }
        self.claim_remaining();
    }

    /// Whether `rule` would succeed, without mutating anything.
    fn can_claim(&self, rule: &ClaimRule) -> bool {
        if !rule.matches(&self.node.class_type, self.node.inputs.get(rule.field)) {
            return false;
        }
        self.annotations
            .redirect_for(self.node_id, rule.field)
            .is_some()
            || !self
                .registry
                .is_retained(&clean_param_name(rule.semantic_name))
    }

    fn claim_paired(&mut self) -> bool {
        if !PAIRED_RULES.iter().all(|rule| self.can_claim(rule)) {
            return false;
        }
        for rule in &PAIRED_RULES {
            self.claim(rule);
        }
        self.registry.retain(ASPECT_RATIO_PARAM);
        self.node
            .inputs
            .insert(crate::classify::BATCH_SIZE_FIELD.to_string(), serde_json::json!(1));
        tracing::debug!(node_id = self.node_id, "Claimed latent width and height");
        true
    }

    /// Apply one single-field claim rule.
    fn claim(&mut self, rule: &ClaimRule) -> bool {
        let Some(value) = self.node.inputs.get(rule.field).cloned() else {
            return false;
        };
        if !rule.matches(&self.node.class_type, Some(&value)) {
            return false;
        }

        if let Some(redirect) = self.annotations.redirect_for(self.node_id, rule.field) {
            let group = ParamGroup::new(
                PRIMITIVES_GROUP_ID,
                PRIMITIVES_GROUP_NAME,
                self.group.priority,
            );
            return self.claim_field(rule.field, &value, Target::redirect(redirect), group);
        }

        let retained_id = clean_param_name(rule.semantic_name);
        if !self.registry.retain(&retained_id) {
            tracing::debug!(
                node_id = self.node_id,
                field = rule.field,
                semantic = rule.semantic_name,
                "Baseline parameter already claimed by another node",
            );
            return false;
        }

        let seed = match classify(
            &self.node.class_type,
            self.node_id,
            rule.field,
            &value,
            self.options,
        ) {
            Classification::Parameter(spec) => spec.seed,
            _ => false,
        };
        let Some(rewritten) = placeholder::for_value(rule.semantic_name, seed, &value) else {
            return false;
        };
        self.node
            .inputs
            .insert(rule.field.to_string(), serde_json::Value::String(rewritten));
        tracing::debug!(
            node_id = self.node_id,
            field = rule.field,
            semantic = rule.semantic_name,
            "Mapped field onto baseline parameter",
        );
        true
    }

    fn claim_prompt(&mut self) -> bool {
        if self.node.class_type != class_types::CLIP_TEXT_ENCODE {
            return false;
        }
        let Some(text) = self
            .node
            .inputs
            .get(PROMPT_TEXT_FIELD)
            .filter(|v| !is_placeholder(v))
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return false;
        };

        for rule in PROMPT_RULES {
            if !self.group.name.starts_with(rule.label_prefix)
                || self.registry.is_retained(rule.semantic_name)
            {
                continue;
            }
            self.registry.retain(rule.semantic_name);
            self.node.inputs.insert(
                PROMPT_TEXT_FIELD.to_string(),
                serde_json::Value::String(placeholder::text(rule.semantic_name, &text)),
            );
            tracing::debug!(
                node_id = self.node_id,
                semantic = rule.semantic_name,
                "Mapped prompt encoder onto baseline parameter",
            );
            return true;
        }
        false
    }

    /// Generic rule for every field not yet claimed.
    fn claim_remaining(&mut self) {
        // Latent width and height stay paired here too: neither is rewritten
        // unless both hold raw numbers.
        let pair_complete = PAIRED_RULES
            .iter()
            .all(|rule| rule.matches(&self.node.class_type, self.node.inputs.get(rule.field)));

        let fields: Vec<String> = self.node.inputs.keys().cloned().collect();
        for field in fields {
            let Some(value) = self.node.inputs.get(&field).cloned() else {
                continue;
            };
            if is_placeholder(&value) || is_skipped_field(&self.node.class_type, &field) {
                continue;
            }
            if !pair_complete && self.is_paired_field(&field) {
                tracing::debug!(node_id = self.node_id, field = %field, "Skipping unpaired latent size");
                continue;
            }

            let target = match self.annotations.redirect_for(self.node_id, &field) {
                Some(redirect) => Target::redirect(redirect),
                None => Target::Fresh {
                    base: clean_param_name(&format!(
                        "{RAW_INPUT_PREFIX}{}{field}",
                        self.group.name
                    )),
                    label: self
                        .annotations
                        .field_label(self.node_id, &field)
                        .unwrap_or(&field)
                        .to_string(),
                },
            };
            let group = self.group.clone();
            self.claim_field(&field, &value, target, group);
        }
    }

    /// Classify, rewrite and (when the classification calls for it)
    /// register one field.
    fn claim_field(
        &mut self,
        field: &str,
        value: &serde_json::Value,
        target: Target,
        group: ParamGroup,
    ) -> bool {
        let spec = match classify(
            &self.node.class_type,
            self.node_id,
            field,
            value,
            self.options,
        ) {
            Classification::Parameter(spec) => spec,
            Classification::Unsupported => return false,
            Classification::ForceSingleBatch => {
                self.node
                    .inputs
                    .insert(field.to_string(), serde_json::json!(1));
                return true;
            }
            Classification::PrefixSentinel => {
                self.set_text(field, placeholder::PREFIX_SENTINEL);
                return true;
            }
            Classification::MissingModelSentinel => {
                self.set_text(field, placeholder::MISSING_MODEL_SENTINEL);
                return true;
            }
        };

        let (id, label) = match target {
            Target::Shared { id, label } => (id, label),
            Target::Fresh { base, label } => (self.registry.allocate_id(&base), label),
        };
        let Some(rewritten) = placeholder::for_value(&id, spec.seed, value) else {
            return false;
        };
        self.set_text(field, &rewritten);

        if !self.registry.is_registered(&id) {
            let range = spec.range();
            self.registry.register(ParameterDefinition::tunable(
                id,
                label,
                value.clone(),
                spec.param_type,
                spec.values,
                spec.view,
                range,
                group,
            ));
        }
        true
    }

    fn is_paired_field(&self, field: &str) -> bool {
        PAIRED_RULES
            .iter()
            .any(|rule| rule.class_type == self.node.class_type && rule.field == field)
    }

    fn set_text(&mut self, field: &str, text: &str) {
        self.node.inputs.insert(
            field.to_string(),
            serde_json::Value::String(text.to_string()),
        );
    }
}
