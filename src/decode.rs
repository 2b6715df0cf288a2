//! Decodes raw model output into a structured [`Decision`].
//!
//! The model is instructed to emit a single JSON object, but real completions
//! arrive wrapped in prose or code fences. Extraction first looks for a
//! fenced block, then falls back to scanning for the outermost balanced JSON
//! object anywhere in the text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::DecodeError;

static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fence pattern is valid")
});
static JSON_QUOTE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)'''json\s*(\{.*?\})\s*'''").expect("fence pattern is valid")
});

/// The literal sentinel the template contract uses for "field not populated".
/// Case-sensitive, and distinct from the empty string.
pub const NONE_SENTINEL: &str = "None";

/// Maps the JSON key names a given prompt template uses onto the canonical
/// decision fields. Different templates may name the fields differently
/// ("Tool call" vs "action" vs "function"); the loop is parameterized by
/// this mapping rather than subclassed per schema.
#[derive(Debug, Clone)]
pub struct DecisionSchema {
    pub tool_call_key: String,
    pub parameters_key: String,
    pub final_response_key: String,
}

impl Default for DecisionSchema {
    fn default() -> Self {
        Self {
            tool_call_key: "Tool call".to_string(),
            parameters_key: "Tool Parameters".to_string(),
            final_response_key: "Final Response".to_string(),
        }
    }
}

impl DecisionSchema {
    pub fn new(
        tool_call_key: impl Into<String>,
        parameters_key: impl Into<String>,
        final_response_key: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_key: tool_call_key.into(),
            parameters_key: parameters_key.into(),
            final_response_key: final_response_key.into(),
        }
    }
}

/// One model call's structured output: either a tool to invoke or a final
/// answer. When both are populated the loop gives the tool call precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub tool_name: Option<String>,
    pub parameters: Vec<String>,
    pub final_response: Option<String>,
}

impl Decision {
    pub fn is_ambiguous(&self) -> bool {
        self.tool_name.is_some() && self.final_response.is_some()
    }
}

/// Extracts and parses a [`Decision`] from raw model output.
pub fn decode_decision(raw: &str, schema: &DecisionSchema) -> Result<Decision, DecodeError> {
    let object = extract_decision_object(raw)?;

    let has_any_key = object.contains_key(&schema.tool_call_key)
        || object.contains_key(&schema.parameters_key)
        || object.contains_key(&schema.final_response_key);
    if !has_any_key {
        return Err(DecodeError::new(
            format!(
                "JSON object contains none of the expected keys \"{}\", \"{}\", \"{}\"",
                schema.tool_call_key, schema.parameters_key, schema.final_response_key
            ),
            raw,
        ));
    }

    let tool_name = match object.get(&schema.tool_call_key) {
        None => None,
        Some(value) if is_absent(value) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(other) => {
            return Err(DecodeError::new(
                format!(
                    "\"{}\" must be a string naming a tool, got: {other}",
                    schema.tool_call_key
                ),
                raw,
            ));
        }
    };

    let parameters = object
        .get(&schema.parameters_key)
        .map(coerce_parameters)
        .unwrap_or_default();

    let final_response = match object.get(&schema.final_response_key) {
        None => None,
        Some(value) if is_absent(value) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
    };

    Ok(Decision {
        tool_name,
        parameters,
        final_response,
    })
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text == NONE_SENTINEL,
        _ => false,
    }
}

/// Normalizes the decoded parameter value into the canonical calling
/// convention: an ordered sequence of strings.
///
/// - `"None"` / null: empty sequence
/// - string: comma-separated values, trimmed, empty segments dropped
/// - array: elements in order (strings verbatim, other values rendered)
/// - object: values in key order, key names dropped
/// - other scalars: single rendered element
fn coerce_parameters(value: &Value) -> Vec<String> {
    match value {
        value if is_absent(value) => Vec::new(),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items.iter().map(render_value).collect(),
        Value::Object(fields) => fields.values().map(render_value).collect(),
        other => vec![render_value(other)],
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Finds and parses the JSON-object candidate in the raw text: a fenced
/// block if one exists, otherwise the first balanced `{...}` span that
/// parses as an object. Prose may contain brace pairs of its own, so the
/// scan resumes from the next `{` whenever a span fails to parse.
fn extract_decision_object(raw: &str) -> Result<Map<String, Value>, DecodeError> {
    if let Some(captures) = JSON_FENCE
        .captures(raw)
        .or_else(|| JSON_QUOTE_FENCE.captures(raw))
    {
        let candidate = captures.get(1).map(|group| group.as_str()).unwrap_or("");
        return serde_json::from_str::<Map<String, Value>>(candidate)
            .map_err(|err| DecodeError::new(format!("malformed JSON object: {err}"), raw));
    }

    let mut last_parse_error = None;
    let mut from = 0;
    while let Some(offset) = raw[from..].find('{') {
        let start = from + offset;
        if let Some(span) = balanced_object_span(&raw[start..]) {
            match serde_json::from_str::<Map<String, Value>>(span) {
                Ok(object) => return Ok(object),
                Err(err) => last_parse_error = Some(err),
            }
        }
        from = start + 1;
    }

    Err(match last_parse_error {
        Some(err) => DecodeError::new(format!("malformed JSON object: {err}"), raw),
        None => DecodeError::new("no JSON object found in response", raw),
    })
}

/// Scans for the first `{` and returns the span up to its matching `}`,
/// tracking string literals and escapes so braces inside values don't
/// unbalance the count.
fn balanced_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
