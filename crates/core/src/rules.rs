//! Ordered claim rules for well-known node fields.
//!
//! Rules are plain descriptors evaluated first-match-wins by the
//! extraction pass:
//!
//! 1. [`PAIRED_RULES`]: latent width and height, claimed together or not
//!    at all. Success ends processing for the node.
//! 2. [`CLAIM_RULES`]: single sampler fields mapped onto baseline
//!    parameters.
//! 3. [`PROMPT_RULES`]: prompt encoders recognised by label. Success ends
//!    processing for the node.
//!
//! Anything left falls through to the generic per-field rule.

use crate::graph::class_types;
use crate::placeholder::is_placeholder;

/// Baseline parameter retained once width and height are both claimed.
pub const ASPECT_RATIO_PARAM: &str = "aspectratio";

/// Sampler meta-field that is never parameterized.
pub const CONTROL_AFTER_GENERATE_FIELD: &str = "control_after_generate";

/// Field holding prompt text on a text encoder.
pub const PROMPT_TEXT_FIELD: &str = "text";

/// Value shape a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

impl FieldKind {
    /// Whether a raw value can be claimed under this kind. Placeholders
    /// never qualify.
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            Self::Numeric => value.is_number(),
            Self::Text => value.is_string() && !is_placeholder(value),
        }
    }
}

/// Maps one node field onto a baseline parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRule {
    pub class_type: &'static str,
    /// Name referenced by the placeholder and, cleaned, by the retained list.
    pub semantic_name: &'static str,
    pub field: &'static str,
    pub kind: FieldKind,
}

const fn rule(
    class_type: &'static str,
    semantic_name: &'static str,
    field: &'static str,
    kind: FieldKind,
) -> ClaimRule {
    ClaimRule {
        class_type,
        semantic_name,
        field,
        kind,
    }
}

pub const PAIRED_RULES: [ClaimRule; 2] = [
    rule(class_types::EMPTY_LATENT_IMAGE, "width", "width", FieldKind::Numeric),
    rule(class_types::EMPTY_LATENT_IMAGE, "height", "height", FieldKind::Numeric),
];

pub const CLAIM_RULES: &[ClaimRule] = &[
    rule(class_types::KSAMPLER, "seed", "seed", FieldKind::Numeric),
    rule(class_types::KSAMPLER, "steps", "steps", FieldKind::Numeric),
    rule(class_types::KSAMPLER, "comfy_sampler", "sampler_name", FieldKind::Text),
    rule(class_types::KSAMPLER, "comfy_scheduler", "scheduler", FieldKind::Text),
    rule(class_types::KSAMPLER, "cfg_scale", "cfg", FieldKind::Numeric),
    rule(class_types::KSAMPLER_ADVANCED, "seed", "noise_seed", FieldKind::Numeric),
    rule(class_types::KSAMPLER_ADVANCED, "steps", "steps", FieldKind::Numeric),
    rule(class_types::KSAMPLER_ADVANCED, "comfy_sampler", "sampler_name", FieldKind::Text),
    rule(class_types::KSAMPLER_ADVANCED, "comfy_scheduler", "scheduler", FieldKind::Text),
    rule(class_types::KSAMPLER_ADVANCED, "cfg_scale", "cfg", FieldKind::Numeric),
];

/// Recognises a prompt encoder by the start of its group label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRule {
    pub label_prefix: &'static str,
    pub semantic_name: &'static str,
}

pub const PROMPT_RULES: &[PromptRule] = &[
    PromptRule {
        label_prefix: crate::annotate::POSITIVE_PROMPT_LABEL,
        semantic_name: "prompt",
    },
    PromptRule {
        label_prefix: crate::annotate::NEGATIVE_PROMPT_LABEL,
        semantic_name: "negativeprompt",
    },
];

impl ClaimRule {
    /// Whether the rule applies to a node of `class_type` holding `value`
    /// in the rule's field.
    pub fn matches(&self, class_type: &str, value: Option<&serde_json::Value>) -> bool {
        self.class_type == class_type && value.is_some_and(|v| self.kind.accepts(v))
    }
}

/// Fields the generic rule never touches.
pub fn is_skipped_field(class_type: &str, field: &str) -> bool {
    field == CONTROL_AFTER_GENERATE_FIELD
        && matches!(
            class_type,
            class_types::KSAMPLER | class_types::KSAMPLER_ADVANCED
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_kind_rejects_strings() {
        assert!(FieldKind::Numeric.accepts(&json!(1)));
        assert!(FieldKind::Numeric.accepts(&json!(1.5)));
        assert!(!FieldKind::Numeric.accepts(&json!("1")));
        assert!(!FieldKind::Numeric.accepts(&json!(["4", 0])));
    }

    #[test]
    fn text_kind_rejects_placeholders() {
        assert!(FieldKind::Text.accepts(&json!("euler")));
        assert!(!FieldKind::Text.accepts(&json!("${comfy_sampler:euler}")));
        assert!(!FieldKind::Text.accepts(&json!(3)));
    }

    #[test]
    fn rule_matches_class_and_value() {
        let seed = CLAIM_RULES[0];
        assert!(seed.matches("KSampler", Some(&json!(1))));
        assert!(!seed.matches("KSamplerAdvanced", Some(&json!(1))));
        assert!(!seed.matches("KSampler", None));
        assert!(!seed.matches("KSampler", Some(&json!(["4", 0]))));
    }

    #[test]
    fn advanced_sampler_seed_uses_noise_seed() {
        let rule = CLAIM_RULES
            .iter()
            .find(|r| r.class_type == "KSamplerAdvanced" && r.semantic_name == "seed")
            .unwrap();
        assert_eq!(rule.field, "noise_seed");
    }

    #[test]
    fn control_after_generate_is_skipped_on_samplers_only() {
        assert!(is_skipped_field("KSampler", "control_after_generate"));
        assert!(is_skipped_field("KSamplerAdvanced", "control_after_generate"));
        assert!(!is_skipped_field("Custom", "control_after_generate"));
        assert!(!is_skipped_field("KSampler", "seed"));
    }
}
