//! Type inference for workflow input fields.

use crate::extract::ExtractOptions;
use crate::graph::class_types;
use crate::params::{NumberViewKind, ParamType, WIDE_RANGE_MAX, WIDE_RANGE_MIN};

/// Field whose numeric value is forced to 1 instead of becoming a parameter.
pub const BATCH_SIZE_FIELD: &str = "batch_size";

/// Values offered for the advanced sampler's enable/disable switches.
pub const ENABLE_DISABLE_VALUES: &[&str] = &["enable", "disable"];

/// Constraints for a field that becomes a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub param_type: ParamType,
    pub values: Option<Vec<String>>,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub view: NumberViewKind,
    /// Seed-capable: the numeric placeholder gets the `+seed` modifier.
    pub seed: bool,
}

impl FieldSpec {
    fn wide(param_type: ParamType) -> Self {
        Self {
            param_type,
            values: None,
            min: WIDE_RANGE_MIN,
            max: WIDE_RANGE_MAX,
            step: 1.0,
            view: NumberViewKind::Big,
            seed: false,
        }
    }

    fn ranged(param_type: ParamType, min: f64, max: f64, step: f64) -> Self {
        Self {
            min,
            max,
            step,
            ..Self::wide(param_type)
        }
    }

    pub fn range(&self) -> (f64, f64, f64) {
        (self.min, self.max, self.step)
    }
}

/// Outcome of classifying one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Rewrite to a placeholder and register a parameter.
    Parameter(FieldSpec),
    /// Overwrite with `1`; no parameter.
    ForceSingleBatch,
    /// Overwrite with the fixed filename-prefix placeholder; no parameter.
    PrefixSentinel,
    /// Overwrite with the missing-model placeholder; no parameter.
    MissingModelSentinel,
    /// Neither number nor string; leave untouched.
    Unsupported,
}

/// Decide how a field is parameterized from its node class, field name and
/// current value.
pub fn classify(
    class_type: &str,
    node_id: &str,
    field: &str,
    value: &serde_json::Value,
    options: &ExtractOptions,
) -> Classification {
    match value {
        serde_json::Value::Number(_) => classify_number(field),
        serde_json::Value::String(_) => classify_string(class_type, node_id, field, options),
        _ => Classification::Unsupported,
    }
}

fn classify_number(field: &str) -> Classification {
    let spec = match field {
        BATCH_SIZE_FIELD => return Classification::ForceSingleBatch,
        "seed" | "noise_seed" => FieldSpec {
            seed: true,
            ..FieldSpec::wide(ParamType::Integer)
        },
        "width" | "height" => FieldSpec {
            view: NumberViewKind::PotSlider,
            ..FieldSpec::ranged(ParamType::Integer, 128.0, 8192.0, 64.0)
        },
        "denoise" => FieldSpec {
            view: NumberViewKind::Slider,
            ..FieldSpec::ranged(ParamType::Decimal, 0.0, 1.0, 0.05)
        },
        "cfg" => FieldSpec::ranged(ParamType::Decimal, 1.0, 50.0, 0.5),
        "steps" | "start_at_step" | "end_at_step" => {
            FieldSpec::ranged(ParamType::Integer, 1.0, 50.0, 1.0)
        }
        _ => FieldSpec::wide(ParamType::Decimal),
    };
    Classification::Parameter(spec)
}

fn classify_string(
    class_type: &str,
    node_id: &str,
    field: &str,
    options: &ExtractOptions,
) -> Classification {
    match (class_type, field) {
        (class_types::SAVE_IMAGE, "filename_prefix") => Classification::PrefixSentinel,
        (class_types::CHECKPOINT_LOADER, "ckpt_name") => {
            if node_id == options.fixed_checkpoint_node_id {
                return Classification::MissingModelSentinel;
            }
            Classification::Parameter(FieldSpec {
                values: Some(options.available_models.clone()),
                ..FieldSpec::wide(ParamType::Model)
            })
        }
        // TODO: render as a checkbox once boolean parameters are supported downstream.
        (class_types::KSAMPLER_ADVANCED, "add_noise" | "return_with_leftover_noise") => {
            Classification::Parameter(FieldSpec {
                values: Some(ENABLE_DISABLE_VALUES.iter().map(|s| s.to_string()).collect()),
                ..FieldSpec::wide(ParamType::Dropdown)
            })
        }
        _ => Classification::Parameter(FieldSpec::wide(ParamType::Text)),
    }
}
