//! Placeholder grammars written into claimed execution-graph fields.
//!
//! The external substitution engine parses these verbatim:
//!
//! - numeric: `%%_COMFYFIXME_${<id>[+seed]:<default>}_ENDFIXME_%%`
//! - string:  `${<id>:<escaped default>}`
//!
//! String defaults are escaped so they cannot close the placeholder early:
//! every `${` becomes `(` and every `}` becomes `)`.

/// Opening delimiter of the numeric grammar.
pub const NUMERIC_OPEN: &str = "%%_COMFYFIXME_${";

/// Closing delimiter of the numeric grammar.
pub const NUMERIC_CLOSE: &str = "}_ENDFIXME_%%";

/// Opening delimiter of the string grammar.
pub const TEXT_OPEN: &str = "${";

/// Modifier appended to seed-capable numeric ids.
pub const SEED_MODIFIER: &str = "+seed";

/// Fixed replacement for a save-image filename prefix.
pub const PREFIX_SENTINEL: &str = "${prefix:}";

/// Fixed replacement for the default checkpoint loader's model name.
pub const MISSING_MODEL_SENTINEL: &str = "${model:error_missing_model}";

/// Render the numeric grammar.
pub fn numeric(id: &str, seed: bool, default: &serde_json::Number) -> String {
    let modifier = if seed { SEED_MODIFIER } else { "" };
    format!(
        "{NUMERIC_OPEN}{id}{modifier}:{}{NUMERIC_CLOSE}",
        format_number(default)
    )
}

/// Render the string grammar, escaping the default.
pub fn text(id: &str, default: &str) -> String {
    format!("{TEXT_OPEN}{id}:{}}}", escape_default(default))
}

/// Render whichever grammar fits `value`. Returns `None` for values that
/// are neither numbers nor strings.
pub fn for_value(id: &str, seed: bool, value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(n) => Some(numeric(id, seed, n)),
        serde_json::Value::String(s) => Some(text(id, s)),
        _ => None,
    }
}

pub fn escape_default(default: &str) -> String {
    default.replace("${", "(").replace('}', ")")
}

/// Whether a field value is already a placeholder of either grammar.
pub fn is_placeholder(value: &serde_json::Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with(TEXT_OPEN) || s.starts_with(NUMERIC_OPEN))
}

/// Format a JSON number the way the editor stringifies it: integral
/// floats print without a fractional part.
pub fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(v: serde_json::Value) -> serde_json::Number {
        match v {
            serde_json::Value::Number(n) => n,
            other => panic!("not a number: {other}"),
        }
    }

    #[test]
    fn numeric_seed_placeholder() {
        assert_eq!(
            numeric("seed", true, &number(json!(12345))),
            "%%_COMFYFIXME_${seed+seed:12345}_ENDFIXME_%%"
        );
    }

    #[test]
    fn numeric_plain_placeholder() {
        assert_eq!(
            numeric("cfg_scale", false, &number(json!(7.5))),
            "%%_COMFYFIXME_${cfg_scale:7.5}_ENDFIXME_%%"
        );
    }

    #[test]
    fn integral_float_prints_without_fraction() {
        assert_eq!(format_number(&number(json!(1.0))), "1");
        assert_eq!(format_number(&number(json!(-3))), "-3");
        assert_eq!(format_number(&number(json!(0.05))), "0.05");
    }

    #[test]
    fn text_placeholder_escapes_delimiters() {
        assert_eq!(text("prompt", "a cat"), "${prompt:a cat}");
        assert_eq!(text("x", "use ${var} here"), "${x:use (var) here}");
    }

    #[test]
    fn escaped_default_cannot_close_placeholder() {
        for original in ["${a}", "plain", "}}", "${${", "mix ${x} and } end", ""] {
            let escaped = escape_default(original);
            assert!(!escaped.contains("${"));
            assert!(!escaped.contains('}'));
        }
        assert_eq!(escape_default("mix ${x} and } end"), "mix (x) and ) end");
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(&json!("${prompt:a}")));
        assert!(is_placeholder(&json!("%%_COMFYFIXME_${seed:1}_ENDFIXME_%%")));
        assert!(!is_placeholder(&json!("euler")));
        assert!(!is_placeholder(&json!(5)));
        assert!(!is_placeholder(&json!(["1", 0])));
    }

    #[test]
    fn for_value_skips_unsupported_types() {
        assert!(for_value("x", false, &json!(true)).is_none());
        assert!(for_value("x", false, &json!(null)).is_none());
        assert!(for_value("x", false, &json!(["1", 0])).is_none());
        assert_eq!(for_value("x", false, &json!("y")).unwrap(), "${x:y}");
    }
}
