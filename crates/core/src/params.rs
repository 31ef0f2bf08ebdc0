//! Parameter definitions and the registry that accumulates them during
//! one extraction pass.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::graph::ExecutionGraph;
use crate::naming::unique_id;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Id of the hidden parameter carrying the rewritten execution graph.
pub const RAW_GRAPH_PARAM_ID: &str = "comfyworkflowraw";

/// Group id of the raw graph parameter.
pub const RAW_GRAPH_GROUP_ID: &str = "comfyworkflow";

/// Group name of the raw graph parameter.
pub const RAW_GRAPH_GROUP_NAME: &str = "Comfy Workflow Raw";

/// Group priority of the raw graph parameter.
pub const RAW_GRAPH_GROUP_PRIORITY: f64 = 10.0;

/// Display priority of the raw graph parameter; sorts ahead of everything.
pub const RAW_GRAPH_PRIORITY: f64 = -1000.0;

/// Display priority of every extracted parameter.
pub const DEFAULT_PARAM_PRIORITY: f64 = 5.0;

/// Default lower bound for numeric inputs with no narrower range.
pub const WIDE_RANGE_MIN: f64 = -9_999_999_999.0;

/// Default upper bound for numeric inputs with no narrower range.
pub const WIDE_RANGE_MAX: f64 = 9_999_999_999.0;

/// Baseline parameters that stay active for every workflow.
pub const INITIAL_RETAINED: &[&str] = &["images", "model"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Semantic type of a parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Integer,
    Decimal,
    #[default]
    Text,
    Model,
    Dropdown,
    /// A type used by externally defined parameters only.
    #[serde(untagged)]
    Other(String),
}

impl ParamType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Model => "model",
            Self::Dropdown => "dropdown",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a numeric parameter is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberViewKind {
    /// Wide free-entry spinner.
    #[default]
    Big,
    Slider,
    /// Slider biased towards powers of two.
    PotSlider,
    #[serde(untagged)]
    Other(String),
}

/// Parameter group, used by the renderer for sectioning and ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub id: String,
    pub name: String,
    /// Lower values sort earlier.
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub toggles: bool,
    #[serde(default)]
    pub do_not_save: bool,
}

impl ParamGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            open: false,
            advanced: false,
            toggles: false,
            do_not_save: true,
        }
    }
}

/// A user-editable parameter.
///
/// Also deserializes externally defined baseline parameters, which may
/// omit most fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub default: serde_json::Value,
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub number_view_type: NumberViewKind,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub step: f64,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub toggleable: bool,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub advanced: bool,
    #[serde(default)]
    pub feature_flag: Option<String>,
    #[serde(default)]
    pub do_not_save: bool,
    /// Set by the renderer-facing assembly for the raw graph parameter.
    #[serde(default)]
    pub extra_hidden: bool,
    #[serde(default)]
    pub group: Option<ParamGroup>,
}

impl ParameterDefinition {
    /// Build a visible, toggleable parameter for a workflow input.
    #[allow(clippy::too_many_arguments)]
    pub fn tunable(
        id: impl Into<String>,
        name: impl Into<String>,
        default: serde_json::Value,
        param_type: ParamType,
        values: Option<Vec<String>>,
        number_view_type: NumberViewKind,
        (min, max, step): (f64, f64, f64),
        group: ParamGroup,
    ) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            description: format!("The {name} input for {} ({param_type})", group.name),
            name,
            default,
            param_type,
            values,
            number_view_type,
            min,
            max,
            step,
            visible: true,
            toggleable: true,
            priority: DEFAULT_PARAM_PRIORITY,
            advanced: false,
            feature_flag: None,
            do_not_save: true,
            extra_hidden: false,
            group: Some(group),
        }
    }

    /// The hidden parameter holding the full rewritten execution graph.
    pub fn raw_graph(graph: &ExecutionGraph) -> Self {
        let group = ParamGroup::new(
            RAW_GRAPH_GROUP_ID,
            RAW_GRAPH_GROUP_NAME,
            RAW_GRAPH_GROUP_PRIORITY,
        );
        Self {
            visible: false,
            toggleable: false,
            priority: RAW_GRAPH_PRIORITY,
            ..Self::tunable(
                RAW_GRAPH_PARAM_ID,
                RAW_GRAPH_PARAM_ID,
                serde_json::Value::String(graph.to_json_string()),
                ParamType::Text,
                None,
                NumberViewKind::Big,
                (0.0, 1.0, 1.0),
                group,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Accumulates parameters and retained baseline ids for one extraction.
#[derive(Debug, Clone)]
pub struct ParamRegistry {
    params: IndexMap<String, ParameterDefinition>,
    /// Ids promised to a parameter that is registered later in the pass.
    reserved: HashSet<String>,
    retained: Vec<String>,
}

impl Default for ParamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self {
            params: IndexMap::new(),
            reserved: HashSet::new(),
            retained: INITIAL_RETAINED.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether `id` is taken, either by a registered parameter or by a
    /// reservation. The raw graph id is always taken.
    pub fn contains(&self, id: &str) -> bool {
        self.is_registered(id) || self.reserved.contains(id)
    }

    /// Whether a parameter with `id` has been registered.
    pub fn is_registered(&self, id: &str) -> bool {
        id == RAW_GRAPH_PARAM_ID || self.params.contains_key(id)
    }

    /// Hold `id` for a later [`register`](Self::register) so that
    /// [`allocate_id`](Self::allocate_id) never hands it out.
    pub fn reserve(&mut self, id: impl Into<String>) {
        self.reserved.insert(id.into());
    }

    /// A free id based on `base`.
    pub fn allocate_id(&self, base: &str) -> String {
        unique_id(base, |candidate| self.contains(candidate))
    }

    /// Add a parameter. Returns `false` (and keeps the existing entry) when
    /// a parameter with the same id is already registered. A reserved id
    /// may be registered once.
    pub fn register(&mut self, param: ParameterDefinition) -> bool {
        if self.is_registered(&param.id) {
            tracing::debug!(id = %param.id, "Parameter already registered");
            return false;
        }
        tracing::debug!(id = %param.id, param_type = %param.param_type, "Registered parameter");
        self.params.insert(param.id.clone(), param);
        true
    }

    /// Mark a baseline parameter as retained. Returns `false` if it already was.
    pub fn retain(&mut self, id: &str) -> bool {
        if self.is_retained(id) {
            return false;
        }
        self.retained.push(id.to_string());
        true
    }

    pub fn is_retained(&self, id: &str) -> bool {
        self.retained.iter().any(|r| r == id)
    }

    pub fn retained(&self) -> &[String] {
        &self.retained
    }

    /// Close the registry: insert the raw graph parameter at the front and
    /// hand back the parameters and retained ids.
    pub fn finish_with_raw_graph(
        mut self,
        graph: &ExecutionGraph,
    ) -> (IndexMap<String, ParameterDefinition>, Vec<String>) {
        self.params.shift_insert(
            0,
            RAW_GRAPH_PARAM_ID.to_string(),
            ParameterDefinition::raw_graph(graph),
        );
        (self.params, self.retained)
    }
}
