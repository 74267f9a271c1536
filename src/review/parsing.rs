use super::ReviewFields;
use serde_json::{json, Map, Value};

pub const DEFAULT_SCORE: f64 = 7.0;
pub const NO_ISSUES: &str = "No issues detected";
pub const NO_SUGGESTIONS: &str = "No suggestions available";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Locate the JSON payload inside a free-text model reply.
///
/// A ```` ```json ```` fence wins over a bare fence; without any fence the
/// whole trimmed reply is the payload. An unterminated fence runs to the end.
pub fn extract_json_payload(reply: &str) -> &str {
    let reply = reply.trim();
    let opener = if reply.contains(JSON_FENCE) {
        JSON_FENCE
    } else if reply.contains(FENCE) {
        FENCE
    } else {
        return reply;
    };

    // opener is known to be present
    let start = reply.find(opener).map_or(0, |i| i + opener.len());
    let rest = &reply[start..];
    let end = rest.find(FENCE).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Parse a reply into a JSON object, or `None` when it is not one.
pub fn parse_reply(reply: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(extract_json_payload(reply)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Record used when the model service could not be reached.
pub fn transport_fallback(error: &str) -> Map<String, Value> {
    object(json!({
        "readability_score": 6.0,
        "modularity_score": 6.0,
        "potential_issues": ["API connection error", error],
        "suggestions": ["Check internet connection", "Try again in a moment"]
    }))
}

/// Record used when the model replied with something that is not a JSON object.
pub fn parse_fallback() -> Map<String, Value> {
    object(json!({
        "readability_score": 7.5,
        "modularity_score": 7.0,
        "potential_issues": ["AI response parsing failed", "Please try uploading the file again"],
        "suggestions": ["Ensure code file is properly formatted", "Try with a smaller code file"]
    }))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Force any parsed object into a complete set of review fields.
pub fn coerce(data: &Map<String, Value>) -> ReviewFields {
    ReviewFields {
        readability_score: score(data.get("readability_score")),
        modularity_score: score(data.get("modularity_score")),
        potential_issues: string_list(data.get("potential_issues"), NO_ISSUES),
        suggestions: string_list(data.get("suggestions"), NO_SUGGESTIONS),
    }
}

fn score(value: Option<&Value>) -> f64 {
    let parsed: Option<f64> = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite()).unwrap_or(DEFAULT_SCORE)
}

fn string_list(value: Option<&Value>, placeholder: &str) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    if items.is_empty() {
        vec![placeholder.to_string()]
    } else {
        items
    }
}
