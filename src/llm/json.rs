use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").expect("valid fence regex"));
static ARRAY_OF_OBJECTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("valid array regex"));
static OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));

fn try_parse(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

/// Extract a JSON value from free-form model output
///
/// Tries, in order: the whole text, a fenced code block, a fence missing its
/// closing marker, the outermost array of objects, the outermost object, and
/// finally the text truncated after its last closing bracket.
pub fn parse_json_from_response(content: &str) -> Option<Value> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }

    if let Some(value) = try_parse(content) {
        return Some(value);
    }

    if content.contains("```") {
        if let Some(inner) = FENCED_BLOCK.captures(content).and_then(|c| c.get(1)) {
            if let Some(value) = try_parse(inner.as_str()) {
                debug!("Parsed JSON from fenced block");
                return Some(value);
            }
        }

        if content.starts_with("```") {
            let lines: Vec<&str> = content.split('\n').collect();
            let body = if lines.len() > 1 && lines[lines.len() - 1].trim().starts_with("```") {
                lines[1..lines.len() - 1].join("\n")
            } else {
                lines[1..].join("\n")
            };
            if let Some(value) = try_parse(&body) {
                return Some(value);
            }
        }
    }

    if let Some(m) = ARRAY_OF_OBJECTS.find(content) {
        if let Some(value) = try_parse(m.as_str()) {
            return Some(value);
        }
    } else if let Some(m) = OBJECT.find(content) {
        if let Some(value) = try_parse(m.as_str()) {
            return Some(value);
        }
    }

    if let Some(end) = content.rfind([']', '}']) {
        if let Some(value) = try_parse(&content[..=end]) {
            return Some(value);
        }
    }

    warn!("Failed to extract JSON from model response");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_json() {
        assert_eq!(parse_json_from_response(" {\"a\": 1} "), Some(json!({"a": 1})));
    }

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n[{\"id\": 1}]\n```\nAnything else?";
        assert_eq!(parse_json_from_response(text), Some(json!([{"id": 1}])));
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "```json\n{\"score\": 8}";
        assert_eq!(parse_json_from_response(text), Some(json!({"score": 8})));
    }

    #[test]
    fn test_embedded_object() {
        let text = "Sure! {\"reviews\": []} Hope that helps.";
        assert_eq!(parse_json_from_response(text), Some(json!({"reviews": []})));
    }

    #[test]
    fn test_trailing_garbage_after_array() {
        let text = "[1, 2, 3]\nextra words";
        assert_eq!(parse_json_from_response(text), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_json_from_response("no json here"), None);
        assert_eq!(parse_json_from_response(""), None);
    }
}
