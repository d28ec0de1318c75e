// Localization quality assessment
//
// Subtitle pairs are reviewed by an LLM and scored 0-10:
// - batch: one request per batch of pairs, JSON in and JSON out, plus the
//   whole-document review and the single-pair review
// - runner: background batch loop with pause/resume/stop and progress events
//
// Model output is loosely structured, so every reader here tolerates wrapper
// objects, missing fields and numbers sent as strings.

pub mod batch;
pub mod runner;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use batch::{
    LqaSettings, merge_lqa_results, parse_pair_response, process_global_lqa, process_lqa_batch,
    review_pair, validate_lqa_result,
};
pub use runner::{LqaControl, LqaEvent, LqaHandle, LqaMode, LqaRunner};

/// Review of one subtitle row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LqaResult {
    #[serde(default)]
    pub id: usize,
    #[serde(default, deserialize_with = "lenient_number")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub issues: Vec<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default, alias = "suggestions")]
    pub suggestion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LqaResult {
    /// Placeholder for a row whose review failed
    pub fn failed(id: usize, issue: &str, error: impl Into<String>) -> Self {
        Self {
            id,
            score: 0.0,
            issues: vec![issue.to_string()],
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn has_suggestion(&self) -> bool {
        !self.suggestion.trim().is_empty()
    }
}

/// Whole-document review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalLqaReport {
    #[serde(default, deserialize_with = "lenient_number")]
    pub global_score: f64,
    #[serde(default)]
    pub global_summary: String,
    #[serde(default)]
    pub consistency_issues: Vec<Value>,
    #[serde(default)]
    pub major_errors: Vec<Value>,
}

impl GlobalLqaReport {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self {
            global_summary: format!("Analysis failed: {}", message),
            ..Self::default()
        }
    }
}

/// Accept `8`, `8.5` or `"8"`
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("score out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid score '{}'", s))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!("invalid score {}", other))),
    }
}

/// Accept a list of strings, a list of objects, or one string
fn lenient_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let to_text = |v: Value| match v {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(to_text).collect(),
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => vec![to_text(other)],
    })
}
