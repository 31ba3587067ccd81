//! Prompt template rendering.
//!
//! Placeholders are `{{ name }}` or `{{ .name }}`; dotted paths walk nested
//! objects. Rendering is lenient: a missing variable renders as empty text.
//! Syntax errors surface only here, at render time.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::errors::AppError;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("placeholder pattern compiles"))
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\.?([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)\s*$")
            .expect("path pattern compiles")
    })
}

/// Renders `template` against `variables`.
pub fn render_template(
    template: &str,
    variables: &HashMap<String, Value>,
) -> Result<String, AppError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let literal = &template[last..whole.start()];
        check_literal(literal, last)?;
        rendered.push_str(literal);

        let body = &caps[1];
        let path = path_re()
            .captures(body)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                AppError::InvalidTemplate(format!(
                    "invalid placeholder '{{{{{body}}}}}' at byte {}",
                    whole.start()
                ))
            })?;

        if let Some(value) = lookup(variables, &path) {
            push_value(&mut rendered, value);
        }
        last = whole.end();
    }

    let tail = &template[last..];
    check_literal(tail, last)?;
    rendered.push_str(tail);
    Ok(rendered)
}

/// Literal text between placeholders must not open another one.
fn check_literal(literal: &str, offset: usize) -> Result<(), AppError> {
    match literal.find("{{") {
        Some(pos) => Err(AppError::InvalidTemplate(format!(
            "unclosed placeholder at byte {}",
            offset + pos
        ))),
        None => Ok(()),
    }
}

fn lookup<'a>(variables: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = variables.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}
