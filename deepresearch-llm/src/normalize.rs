//! Response normalization
//!
//! Turns the free-form text a completion provider returned into a value that
//! satisfies a [`StructuredSchema`]. Parsing is attempted in order: the whole
//! body as JSON, the first fenced code block that parses, the outermost brace
//! slice, and finally heuristic list extraction for schemas that carry a
//! list-of-strings field.

use crate::schema::StructuredSchema;
use deepresearch_core::{schema_violation, ErrorContext, ResearchError, ResearchResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

fn fenced_block_regex() -> Option<&'static Regex> {
    static FENCED: OnceLock<Option<Regex>> = OnceLock::new();
    FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").ok())
        .as_ref()
}

fn numbered_item_regex() -> Option<&'static Regex> {
    static NUMBERED: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBERED
        .get_or_init(|| Regex::new(r"^\s*\d+[.)]\s+(.+)$").ok())
        .as_ref()
}

fn bullet_item_regex() -> Option<&'static Regex> {
    static BULLET: OnceLock<Option<Regex>> = OnceLock::new();
    BULLET
        .get_or_init(|| Regex::new(r"^\s*[-*•]\s+(.+)$").ok())
        .as_ref()
}

/// Parse raw provider output and validate it against `schema`
pub fn parse_structured(raw: &str, schema: &StructuredSchema) -> ResearchResult<Value> {
    if let Some(value) = parse_json(raw) {
        return normalize_value(value, schema);
    }

    if let Some(field) = schema.string_list_field() {
        let items = extract_list_items(raw);
        if !items.is_empty() {
            debug!(
                schema = schema.name(),
                field = %field.name,
                items = items.len(),
                "Falling back to heuristic list extraction"
            );
            let mut object = Map::new();
            object.insert(
                field.name.clone(),
                Value::Array(items.into_iter().map(Value::String).collect()),
            );
            return normalize_value(Value::Object(object), schema);
        }
    }

    Err(ResearchError::Upstream {
        service: "completion".to_string(),
        message: format!("Response for '{}' contained no parseable JSON", schema.name()),
        status: None,
        raw: Some(raw.to_string()),
        source: None,
        context: ErrorContext::new("structured_completion")
            .with_operation("parse")
            .with_metadata("schema", schema.name())
            .with_suggestion("Check that the model follows JSON output instructions"),
    })
}

/// Reconcile an already-parsed value with `schema`: wrap bare arrays, remap
/// alternate field names, then validate
pub fn normalize_value(value: Value, schema: &StructuredSchema) -> ResearchResult<Value> {
    let mut value = schema.wrap_bare_array(value);
    schema.remap_fields(&mut value);
    schema
        .validate(&value)
        .map_err(|message| schema_violation!(schema.name(), message))?;
    Ok(value)
}

fn parse_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(regex) = fenced_block_regex() {
        let fenced = regex
            .captures_iter(trimmed)
            .filter_map(|captures| captures.get(1))
            .find_map(|block| serde_json::from_str::<Value>(block.as_str()).ok());
        if fenced.is_some() {
            return fenced;
        }
    }

    let (start, end) = (trimmed.find('{')?, trimmed.rfind('}')?);
    if start < end {
        serde_json::from_str::<Value>(&trimmed[start..=end]).ok()
    } else {
        None
    }
}

/// Split list-like prose into items: numbered lines first, then bullets, then plain lines
fn extract_list_items(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .collect();

    for regex in [numbered_item_regex(), bullet_item_regex()].into_iter().flatten() {
        let items: Vec<String> = lines
            .iter()
            .filter_map(|line| regex.captures(line))
            .filter_map(|captures| captures.get(1))
            .map(|item| item.as_str().trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if !items.is_empty() {
            return items;
        }
    }

    lines.into_iter().map(str::to_string).collect()
}
