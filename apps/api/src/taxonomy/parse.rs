//! Defensive parsing helpers for model-proposed taxonomies.
//!
//! Input comes straight from a generative model, so every entry is checked:
//! names are normalized, object keys leaking into `children` are treated as a
//! corrupted schema, generic wrapper labels are flattened away and prose that
//! slipped into a label list is dropped.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;

/// Bare strings that signal the model emitted object keys as array elements.
pub const RESERVED_TOKENS: &[&str] = &["name", "description", "children"];

/// Wrapper labels that are never persisted; their children move up a level.
pub const SKIPPABLE_CONTAINERS: &[&str] = &["taxonomy", "taxonomic groups", "taxonomic group"];

const SENTENCE_PUNCTUATION: &[char] = &['.', ';', ':'];
const SENTENCE_MAX_WORDS: usize = 10;
const SENTENCE_MAX_CHARS: usize = 120;

/// A node object as the model writes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub children: Vec<Value>,
}

/// One entry of a `children` array.
#[derive(Debug, Clone)]
pub enum ChildEntry {
    Object(RawNode),
    Leaf(String),
}

/// Object first, then string; anything else is rejected.
pub fn classify_child(value: &Value) -> Result<ChildEntry, AppError> {
    match value {
        Value::Object(_) => RawNode::deserialize(value)
            .map(ChildEntry::Object)
            .map_err(|e| AppError::InvalidArgument(format!("malformed taxonomy node: {e}"))),
        Value::String(s) => Ok(ChildEntry::Leaf(s.clone())),
        other => Err(AppError::InvalidArgument(format!(
            "taxonomy entry must be an object or a string, got {other}"
        ))),
    }
}

/// Trim, collapse whitespace runs, and replace the path separator.
pub fn normalize_name(raw: &str) -> String {
    raw.replace('/', "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase; every run of characters outside `[a-z0-9]` becomes one `-`;
/// leading and trailing `-` are removed.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

pub fn is_reserved_token(label: &str) -> bool {
    let label = label.trim();
    RESERVED_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(label))
}

pub fn is_skippable_container(name: &str) -> bool {
    let name = name.trim();
    SKIPPABLE_CONTAINERS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(name))
}

/// Heuristic for prose masquerading as a label.
pub fn looks_like_sentence(label: &str) -> bool {
    label.contains(SENTENCE_PUNCTUATION)
        || label.split_whitespace().count() > SENTENCE_MAX_WORDS
        || label.chars().count() > SENTENCE_MAX_CHARS
}

/// Fails when any bare-string entry of `children` is a reserved token.
pub fn reject_reserved_children(owner: &str, children: &[Value]) -> Result<(), AppError> {
    let leaked: Vec<&str> = children
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| is_reserved_token(s))
        .collect();
    if leaked.is_empty() {
        return Ok(());
    }
    Err(AppError::CorruptedTaxonomyInput(format!(
        "children of '{owner}' contain object keys {leaked:?}; \
        the generated structure does not follow the taxonomy schema"
    )))
}
