//! Shared helpers for the core integration tests.

#![allow(dead_code)]

use templater_core::placeholder::{NUMERIC_CLOSE, NUMERIC_OPEN, SEED_MODIFIER, TEXT_OPEN};

/// Which grammar a rewritten field uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Numeric,
    Text,
}

/// A decoded placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub id: String,
    pub seed: bool,
    /// The default exactly as written (still escaped for text).
    pub default: String,
}

/// Decode a rewritten field. Returns `None` for anything that is not
/// exactly one placeholder.
pub fn parse_placeholder(s: &str) -> Option<Placeholder> {
    let (kind, body) = if let Some(inner) = s
        .strip_prefix(NUMERIC_OPEN)
        .and_then(|rest| rest.strip_suffix(NUMERIC_CLOSE))
    {
        (PlaceholderKind::Numeric, inner)
    } else {
        let inner = s.strip_prefix(TEXT_OPEN)?.strip_suffix('}')?;
        (PlaceholderKind::Text, inner)
    };

    let (head, default) = body.split_once(':')?;
    if default.contains('}') || default.contains("${") {
        return None;
    }
    let (id, seed) = match head.strip_suffix(SEED_MODIFIER) {
        Some(id) => (id, true),
        None => (head, false),
    };
    Some(Placeholder {
        kind,
        id: id.to_string(),
        seed,
        default: default.to_string(),
    })
}

/// Reverse of `escape_default`; exact only for defaults that contained no
/// literal parentheses.
pub fn unescape_default(escaped: &str) -> String {
    escaped.replace('(', "${").replace(')', "}")
}
