//! Editor snapshot data model.
//!
//! A snapshot is what the ComfyUI editor hands back from `graphToPrompt`:
//! the visual graph as authored (`workflow`) and the compiled execution
//! graph (`output`). Parsing is deliberately lenient below the top level
//! so that odd graph shapes degrade to "no annotation" instead of failing.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum snapshot JSON size in bytes (10 MB).
pub const MAX_SNAPSHOT_JSON_SIZE: usize = 10_000_000;

// ---------------------------------------------------------------------------
// ComfyUI node class types with dedicated extraction behaviour
// ---------------------------------------------------------------------------

/// Node class types recognised by the extraction rules.
pub mod class_types {
    pub const KSAMPLER: &str = "KSampler";
    pub const KSAMPLER_ADVANCED: &str = "KSamplerAdvanced";
    pub const EMPTY_LATENT_IMAGE: &str = "EmptyLatentImage";
    pub const CLIP_TEXT_ENCODE: &str = "CLIPTextEncode";
    pub const SAVE_IMAGE: &str = "SaveImage";
    pub const CHECKPOINT_LOADER: &str = "CheckpointLoaderSimple";

    /// Visual-graph node type that feeds a user-named value into a slot.
    pub const PRIMITIVE_NODE: &str = "PrimitiveNode";
}

// ---------------------------------------------------------------------------
// Visual graph
// ---------------------------------------------------------------------------

/// The editable node-and-link diagram as authored in the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualGraph {
    #[serde(default, deserialize_with = "lenient_nodes")]
    pub nodes: Vec<VisualNode>,
    /// Raw link arrays: `[link_id, from_node, from_slot, to_node, to_slot, type?]`.
    #[serde(default, deserialize_with = "lenient_array")]
    pub links: Vec<serde_json::Value>,
}

/// A single node of the visual graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualNode {
    /// Node id; ComfyUI emits numbers, some exporters emit strings.
    #[serde(default)]
    pub id: serde_json::Value,
    /// User-given title. Only present when it differs from the default.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string_or_empty")]
    pub node_type: String,
    #[serde(
        default,
        deserialize_with = "lenient_inputs",
        skip_serializing_if = "Option::is_none"
    )]
    pub inputs: Option<Vec<VisualInput>>,
}

/// A declared input slot on a visual node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualInput {
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub name: String,
}

/// A decoded visual-graph link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualLink {
    pub id: u64,
    pub from_node: String,
    pub from_slot: u64,
    pub to_node: String,
    pub to_slot: u64,
}

impl VisualNode {
    /// The node id as a map key, if it is a string or number.
    pub fn key(&self) -> Option<String> {
        node_key(&self.id)
    }

    /// The title, if one was set and is non-empty.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.is_empty())
    }
}

impl VisualLink {
    /// Decode a raw link array. Returns `None` for anything shorter than
    /// five elements or with non-numeric slots.
    pub fn from_value(raw: &serde_json::Value) -> Option<Self> {
        let arr = raw.as_array()?;
        if arr.len() < 5 {
            return None;
        }
        Some(Self {
            id: arr[0].as_u64()?,
            from_node: node_key(&arr[1])?,
            from_slot: arr[2].as_u64()?,
            to_node: node_key(&arr[3])?,
            to_slot: arr[4].as_u64()?,
        })
    }
}

impl VisualGraph {
    /// Iterate decoded links, skipping malformed entries.
    pub fn links(&self) -> impl Iterator<Item = VisualLink> + '_ {
        self.links.iter().filter_map(|raw| {
            let link = VisualLink::from_value(raw);
            if link.is_none() {
                tracing::warn!(link = %raw, "Skipping malformed visual link");
            }
            link
        })
    }
}

/// A string field, or `None` when the field holds anything else.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_string)))
}

fn lenient_string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_string(d)?.unwrap_or_default())
}

/// An array field, or empty when the field holds anything else.
fn lenient_array<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<serde_json::Value>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    })
}

/// Visual nodes, dropping entries that are not node objects.
fn lenient_nodes<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<VisualNode>, D::Error> {
    Ok(lenient_array(d)?
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<VisualNode>(raw) {
            Ok(node) => Some(node),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed visual node");
                None
            }
        })
        .collect())
}

/// Input slots. Slot positions matter for link resolution, so a malformed
/// slot keeps its place with an empty name.
fn lenient_inputs<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<VisualInput>>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .iter()
                .map(|slot| VisualInput {
                    name: slot
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect(),
        ),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Execution graph
// ---------------------------------------------------------------------------

/// One node of the compiled execution graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromptNode {
    /// Input values: scalars, or `[source_node_id, source_slot]` references.
    pub inputs: IndexMap<String, serde_json::Value>,
    pub class_type: String,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl PromptNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            ..Self::default()
        }
    }

    /// Read a node leniently. A missing or null `class_type`/`inputs`
    /// becomes empty; a node that is not an object, or whose `class_type`
    /// is not a string or whose `inputs` is not an object, yields `None`.
    pub fn from_value(raw: &serde_json::Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let class_type = match obj.get("class_type") {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(_) => return None,
        };
        let inputs = match obj.get("inputs") {
            None | Some(serde_json::Value::Null) => IndexMap::new(),
            Some(serde_json::Value::Object(map)) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            Some(_) => return None,
        };
        let meta = obj.get("_meta").filter(|m| !m.is_null()).cloned();
        Some(Self {
            inputs,
            class_type,
            meta,
        })
    }

    /// Builder-style input setter, mostly for fixtures.
    pub fn with_input(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }
}

/// Node id to [`PromptNode`] mapping, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionGraph(IndexMap<String, PromptNode>);

impl<'de> Deserialize<'de> for ExecutionGraph {
    /// Malformed nodes are dropped with a warning instead of failing the
    /// whole graph.
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, serde_json::Value>::deserialize(d)?;
        let nodes = raw
            .into_iter()
            .filter_map(|(id, node)| match PromptNode::from_value(&node) {
                Some(node) => Some((id, node)),
                None => {
                    tracing::warn!(node_id = %id, "Skipping malformed execution node");
                    None
                }
            })
            .collect();
        Ok(Self(nodes))
    }
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, node: PromptNode) -> Option<PromptNode> {
        self.0.insert(id.into(), node)
    }

    pub fn get(&self, id: &str) -> Option<&PromptNode> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (&String, &PromptNode)> {
        self.0.iter()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (&String, &mut PromptNode)> {
        self.0.iter_mut()
    }

    /// Compact JSON of the whole graph, in node insertion order.
    pub fn to_json_string(&self) -> String {
        // String-keyed maps of JSON values always serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The pair returned by the editor surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorSnapshot {
    pub workflow: VisualGraph,
    pub output: ExecutionGraph,
}

/// Parse an editor snapshot (`{"workflow": ..., "output": ...}`).
pub fn parse_snapshot(json: &serde_json::Value) -> Result<EditorSnapshot, CoreError> {
    let obj = json
        .as_object()
        .ok_or_else(|| CoreError::Validation("Snapshot JSON must be an object".to_string()))?;

    validate_snapshot_json_size(json)?;

    let workflow = obj.get("workflow").ok_or_else(|| {
        CoreError::Validation("Snapshot is missing the 'workflow' visual graph".to_string())
    })?;
    let output = obj.get("output").ok_or_else(|| {
        CoreError::Validation("Snapshot is missing the 'output' execution graph".to_string())
    })?;

    let workflow: VisualGraph = serde_json::from_value(workflow.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable visual graph, continuing without annotations");
        VisualGraph::default()
    });
    let output: ExecutionGraph = serde_json::from_value(output.clone())
        .map_err(|e| CoreError::Validation(format!("Invalid execution graph: {e}")))?;

    Ok(EditorSnapshot { workflow, output })
}

/// Validate that a snapshot does not exceed the size limit.
pub fn validate_snapshot_json_size(json: &serde_json::Value) -> Result<(), CoreError> {
    let serialized = serde_json::to_string(json)
        .map_err(|e| CoreError::Internal(format!("Failed to serialize snapshot JSON: {e}")))?;
    if serialized.len() > MAX_SNAPSHOT_JSON_SIZE {
        return Err(CoreError::Validation(format!(
            "Snapshot JSON exceeds maximum size of {} bytes (got {} bytes)",
            MAX_SNAPSHOT_JSON_SIZE,
            serialized.len()
        )));
    }
    Ok(())
}

/// Normalise a node id (string or number) into a map key.
pub fn node_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode an execution-graph reference: `[source_node_id, source_slot]`.
pub fn reference(value: &serde_json::Value) -> Option<(String, u64)> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    Some((node_key(&arr[0])?, arr[1].as_u64()?))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_snapshot_json() -> serde_json::Value {
        json!({
            "workflow": {
                "nodes": [
                    { "id": 3, "type": "KSampler", "inputs": [{ "name": "model", "link": 1 }] },
                    { "id": 10, "type": "PrimitiveNode", "title": "MySeed" }
                ],
                "links": [
                    [1, 4, 0, 3, 0, "MODEL"],
                    [2, 10, 0, 3, 1, "INT"],
                    "garbage"
                ]
            },
            "output": {
                "3": {
                    "inputs": { "seed": 1, "model": ["4", 0] },
                    "class_type": "KSampler"
                },
                "1": {
                    "inputs": { "ckpt_name": "a.safetensors" },
                    "class_type": "CheckpointLoaderSimple",
                    "_meta": { "title": "Load Checkpoint" }
                }
            }
        })
    }

    #[test]
    fn parse_sample_snapshot() {
        let snapshot = parse_snapshot(&sample_snapshot_json()).unwrap();
        assert_eq!(snapshot.workflow.nodes.len(), 2);
        assert_eq!(snapshot.output.len(), 2);
        assert_eq!(snapshot.workflow.nodes[1].title(), Some("MySeed"));
    }

    #[test]
    fn execution_graph_keeps_insertion_order() {
        let snapshot = parse_snapshot(&sample_snapshot_json()).unwrap();
        let ids: Vec<_> = snapshot.output.nodes().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn malformed_links_are_skipped() {
        let snapshot = parse_snapshot(&sample_snapshot_json()).unwrap();
        let links: Vec<_> = snapshot.workflow.links().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[1],
            VisualLink {
                id: 2,
                from_node: "10".to_string(),
                from_slot: 0,
                to_node: "3".to_string(),
                to_slot: 1,
            }
        );
    }

    #[test]
    fn short_link_is_rejected() {
        assert!(VisualLink::from_value(&json!([1, 2, 0, 3])).is_none());
        assert!(VisualLink::from_value(&json!([1, 2, 0, 3, "x"])).is_none());
    }

    #[test]
    fn meta_survives_round_trip() {
        let snapshot = parse_snapshot(&sample_snapshot_json()).unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&snapshot.output.to_json_string()).unwrap();
        assert_eq!(raw["1"]["_meta"]["title"], "Load Checkpoint");
        assert!(raw["3"].get("_meta").is_none());
    }

    #[test]
    fn node_missing_class_type_defaults_to_empty() {
        let json = json!({ "workflow": {}, "output": { "1": { "inputs": { "a": 1 } } } });
        let snapshot = parse_snapshot(&json).unwrap();
        assert_eq!(snapshot.output.get("1").unwrap().class_type, "");
        assert!(snapshot.workflow.nodes.is_empty());
    }

    #[test]
    fn malformed_execution_nodes_are_skipped_or_emptied() {
        let json = json!({
            "workflow": {},
            "output": {
                "3": { "inputs": { "seed": 1 }, "class_type": "KSampler" },
                "9": { "inputs": null, "class_type": "Note" },
                "10": { "inputs": { "a": 1 }, "class_type": 5 },
                "11": { "inputs": [1, 2], "class_type": "X" },
                "12": "garbage"
            }
        });
        let snapshot = parse_snapshot(&json).unwrap();
        let ids: Vec<_> = snapshot.output.nodes().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["3", "9"]);
        assert!(snapshot.output.get("9").unwrap().inputs.is_empty());
        assert_eq!(snapshot.output.get("9").unwrap().class_type, "Note");
    }

    #[test]
    fn malformed_visual_fields_degrade_to_defaults() {
        let json = json!({
            "workflow": {
                "nodes": [
                    { "id": 3, "type": 7, "title": 42, "inputs": [{ "name": 1 }, null, { "name": "seed" }] },
                    null,
                    { "id": 4, "type": "KSampler", "inputs": "none" }
                ],
                "links": null
            },
            "output": {}
        });
        let snapshot = parse_snapshot(&json).unwrap();
        let nodes = &snapshot.workflow.nodes;
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].title(), None);
        assert_eq!(nodes[0].node_type, "");
        let names: Vec<_> = nodes[0]
            .inputs
            .as_ref()
            .unwrap()
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, vec!["", "", "seed"]);
        assert!(nodes[1].inputs.is_none());
        assert!(snapshot.workflow.links.is_empty());
    }

    #[test]
    fn unreadable_workflow_becomes_empty_visual_graph() {
        let json = json!({ "workflow": "nope", "output": {} });
        let snapshot = parse_snapshot(&json).unwrap();
        assert!(snapshot.workflow.nodes.is_empty());
    }

    #[test]
    fn parse_non_object_returns_error() {
        let err = parse_snapshot(&json!([1, 2])).unwrap_err().to_string();
        assert!(err.contains("must be an object"));
    }

    #[test]
    fn parse_missing_output_returns_error() {
        let err = parse_snapshot(&json!({ "workflow": {} })).unwrap_err().to_string();
        assert!(err.contains("'output'"));
    }

    #[test]
    fn parse_invalid_output_returns_error() {
        let json = json!({ "workflow": {}, "output": [1, 2] });
        let err = parse_snapshot(&json).unwrap_err().to_string();
        assert!(err.contains("Invalid execution graph"));
    }

    #[test]
    fn reference_accepts_string_and_numeric_sources() {
        assert_eq!(reference(&json!(["6", 0])), Some(("6".to_string(), 0)));
        assert_eq!(reference(&json!([7, 1])), Some(("7".to_string(), 1)));
        assert_eq!(reference(&json!(["6", 0, 1])), None);
        assert_eq!(reference(&json!("text")), None);
        assert_eq!(reference(&json!([true, 0])), None);
    }

    #[test]
    fn small_json_passes_size_check() {
        assert!(validate_snapshot_json_size(&json!({"test": "small"})).is_ok());
    }
}
