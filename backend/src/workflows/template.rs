// Template Renderer - {{variable}} substitution shared by live sends and previews

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Flat (optionally nested) key/value data a template is rendered against
pub type TemplateData = Map<String, Value>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Substitute every `{{key}}` with the string form of `data[key]`.
///
/// Unknown keys are left verbatim so a missing variable stays visible in the
/// output. Substituted values are never re-scanned.
pub fn render(template: &str, data: &TemplateData) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            match lookup(data, caps[1].trim()) {
                Some(value) => value_to_string(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

pub fn render_opt(template: Option<&str>, data: &TemplateData) -> Option<String> {
    template.map(|t| render(t, data))
}

/// Resolve `key` in `data`; dotted keys fall back to walking nested objects
pub fn lookup<'a>(data: &'a TemplateData, key: &str) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }
    if let Some(value) = data.get(key) {
        return Some(value);
    }
    if !key.contains('.') {
        return None;
    }

    let mut parts = key.split('.');
    let mut current = data.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Distinct placeholder keys in order of first appearance
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut variables: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let key = caps[1].trim();
        if !key.is_empty() && !variables.iter().any(|v| v == key) {
            variables.push(key.to_string());
        }
    }
    variables
}
