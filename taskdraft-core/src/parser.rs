//! Extraction of a [`TaskDraft`] from raw model output.

use crate::domain::{Priority, TaskDraft, MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use jsonschema::Validator as JsonSchemaValidator;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

const FENCE: &str = "```";

static DRAFT_SCHEMA: LazyLock<Result<JsonSchemaValidator, String>> = LazyLock::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["title"],
        "properties": {
            "title": {
                "type": "string",
                "minLength": 1,
                "maxLength": MAX_TITLE_CHARS
            },
            "description": {
                "type": ["string", "null"],
                "maxLength": MAX_DESCRIPTION_CHARS
            },
            "priority": {
                "type": ["integer", "null"],
                "enum": [0, 1, 2, null]
            }
        }
    });
    JsonSchemaValidator::new(&schema).map_err(|e| e.to_string())
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("response has no title")]
    MissingTitle,
    #[error("response failed validation: {0}")]
    Schema(String),
    #[error("draft schema could not be compiled: {0}")]
    SchemaDefinition(String),
}

/// Parses model output, discarding the failure reason.
pub fn parse_response(raw: &str) -> Option<TaskDraft> {
    try_parse_response(raw).ok()
}

pub fn try_parse_response(raw: &str) -> Result<TaskDraft, ParseError> {
    let body = strip_fences(raw.trim());
    let value: Value = serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(ParseError::NotAnObject);
    };
    if !object.contains_key("title") {
        return Err(ParseError::MissingTitle);
    }

    let validator = DRAFT_SCHEMA
        .as_ref()
        .map_err(|e| ParseError::SchemaDefinition(e.clone()))?;
    if let Some(err) = validator.iter_errors(&value).next() {
        return Err(ParseError::Schema(err.to_string()));
    }

    extract(object)
}

/// Removes one opening fence line (with its optional language tag) and one closing fence.
fn strip_fences(text: &str) -> &str {
    let mut body = text;
    if let Some(rest) = body.strip_prefix(FENCE) {
        body = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix(FENCE) {
        body = rest;
    }
    body.trim()
}

fn extract(object: &Map<String, Value>) -> Result<TaskDraft, ParseError> {
    let title = object
        .get("title")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingTitle)?
        .to_string();

    let description = match object.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(ParseError::Schema(format!(
                "description must be a string, got {other}"
            )))
        }
    };

    let priority = match object.get("priority") {
        None | Some(Value::Null) => Priority::Low,
        Some(v) => {
            let n = v
                .as_i64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| ParseError::Schema(format!("priority must be an integer, got {v}")))?;
            Priority::try_from(n).map_err(|e| ParseError::Schema(e.to_string()))?
        }
    };

    Ok(TaskDraft {
        title,
        description,
        priority,
    })
}
