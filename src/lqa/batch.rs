use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use super::{GlobalLqaReport, LqaResult};
use crate::config::Config;
use crate::error::{KaocheError, Result};
use crate::llm::{LlmClient, LlmRequest, parse_json_from_response};
use crate::prompts::{PromptVars, format_prompt};

const PAIR_SYSTEM_PROMPT: &str = "You are a professional translation quality reviewer.";
const REQUIRED_FIELDS: [&str; 5] = ["id", "score", "issues", "comment", "suggestion"];
const DEFAULT_PAIR_SCORE: f64 = 5.0;

/// Review parameters shared by every request of a run
#[derive(Debug, Clone)]
pub struct LqaSettings {
    pub context: String,
    pub source_language: String,
    pub target_language: String,
    pub temperature: f32,
    pub batch_size: usize,
}

impl LqaSettings {
    /// Settings from `[lqa]`; a non-empty project context wins over the configured one
    pub fn from_config(config: &Config, project_context: &str) -> Self {
        let context = if project_context.trim().is_empty() {
            config.lqa.global_context.clone()
        } else {
            project_context.to_string()
        };
        Self {
            context,
            source_language: config.lqa.source_language.clone(),
            target_language: config.lqa.target_language.clone(),
            temperature: config.lqa.temperature,
            batch_size: config.lqa.batch_size.max(1),
        }
    }

    fn vars(&self) -> PromptVars<'_> {
        PromptVars::languages(&self.context, &self.source_language, &self.target_language)
    }
}

impl Default for LqaSettings {
    fn default() -> Self {
        Self::from_config(&Config::default(), "")
    }
}

/// Every review field must be present; `suggestions` counts as `suggestion`
pub fn validate_lqa_result(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => REQUIRED_FIELDS.iter().all(|field| {
            map.contains_key(*field) || (*field == "suggestion" && map.contains_key("suggestions"))
        }),
        None => false,
    }
}

/// Unwrap `{"reviews": [...]}` and single objects into a list
fn review_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("reviews") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    }
}

/// Review one batch of pairs; ids are `start_id + index`
///
/// Failures are logged and yield no results so a run can continue with the
/// next batch.
pub async fn process_lqa_batch(
    client: &dyn LlmClient,
    template: &str,
    pairs: &[(String, String)],
    start_id: usize,
    settings: &LqaSettings,
) -> Vec<LqaResult> {
    let payload: Vec<Value> = pairs
        .iter()
        .enumerate()
        .map(|(i, (source, target))| json!({"id": start_id + i, "source": source, "target": target}))
        .collect();
    let user = Value::Array(payload).to_string();
    let system = format_prompt(template, &settings.vars());
    let request = LlmRequest::new(system, user).json().temperature(settings.temperature);

    let response = match client.generate(&request).await {
        Ok(response) => response,
        Err(e) => {
            error!("LQA batch starting at {} failed: {}", start_id, e);
            return Vec::new();
        }
    };

    let Some(parsed) = parse_json_from_response(&response.text) else {
        let preview: String = response.text.chars().take(500).collect();
        error!("LQA batch starting at {} returned no JSON: {}", start_id, preview);
        return Vec::new();
    };

    let end_id = start_id + pairs.len();
    let results: Vec<LqaResult> = review_items(parsed)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, mut item)| {
            let id = item.get("id").and_then(Value::as_u64).map(|id| id as usize);
            if id.is_none_or(|id| id >= end_id) {
                if let Some(map) = item.as_object_mut() {
                    map.insert("id".to_string(), json!(start_id + idx));
                }
            }
            if !validate_lqa_result(&item) {
                warn!("Dropping incomplete LQA review: {}", item);
                return None;
            }
            serde_json::from_value::<LqaResult>(item)
                .map_err(|e| warn!("Dropping malformed LQA review: {}", e))
                .ok()
        })
        .collect();

    info!("LQA batch starting at {} complete: {} results", start_id, results.len());
    results
}

/// Combine batches keyed by row id; later batches win on duplicates
pub fn merge_lqa_results<I>(batches: I) -> BTreeMap<usize, LqaResult>
where
    I: IntoIterator<Item = Vec<LqaResult>>,
{
    let merged: BTreeMap<usize, LqaResult> = batches
        .into_iter()
        .flatten()
        .map(|result| (result.id, result))
        .collect();
    info!("Merged {} LQA results", merged.len());
    merged
}

/// Review the whole document at once
pub async fn process_global_lqa(
    client: &dyn LlmClient,
    template: &str,
    pairs: &[(String, String)],
    settings: &LqaSettings,
) -> GlobalLqaReport {
    let payload: Vec<Value> = pairs
        .iter()
        .enumerate()
        .map(|(i, (source, target))| json!({"id": i, "source": source, "target": target}))
        .collect();
    let request = LlmRequest::new(format_prompt(template, &settings.vars()), Value::Array(payload).to_string())
        .json()
        .temperature(settings.temperature);

    let outcome: Result<GlobalLqaReport> = async {
        let response = client.generate(&request).await?;
        let value = parse_json_from_response(&response.text)
            .ok_or_else(|| KaocheError::Lqa("Response contained no JSON".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }
    .await;

    match outcome {
        Ok(report) => {
            info!("Global LQA complete with score {}", report.global_score);
            report
        }
        Err(e) => {
            error!("Global LQA failed: {}", e);
            GlobalLqaReport::failed(e)
        }
    }
}

/// Read a single-pair review, filling defaults for missing fields
pub fn parse_pair_response(text: &str, id: usize) -> LqaResult {
    debug!("LQA pair response: {}", text.chars().take(200).collect::<String>());

    let value = match parse_json_from_response(text) {
        Some(Value::Array(items)) => match items.into_iter().next() {
            Some(first) => first,
            None => {
                return LqaResult {
                    id,
                    score: DEFAULT_PAIR_SCORE,
                    ..LqaResult::default()
                };
            }
        },
        Some(value) => value,
        None => {
            error!("Failed to parse LQA response for row {}", id);
            return LqaResult::failed(id, "JSON parse failed", "response is not valid JSON");
        }
    };

    let Value::Object(mut map) = value else {
        return LqaResult::failed(id, "JSON parse failed", "response is not a JSON object");
    };
    map.insert("id".to_string(), json!(id));
    map.entry("score").or_insert(json!(DEFAULT_PAIR_SCORE));

    serde_json::from_value(Value::Object(map)).unwrap_or_else(|e| {
        error!("Malformed LQA response for row {}: {}", id, e);
        LqaResult::failed(id, "Parse failed", e.to_string())
    })
}

/// Review one pair with a template that carries `{source}` and `{target}`
pub async fn review_pair(
    client: &dyn LlmClient,
    template: &str,
    id: usize,
    source: &str,
    target: &str,
    settings: &LqaSettings,
) -> Result<LqaResult> {
    let user = format_prompt(template, &settings.vars().pair(source, target));
    let request = LlmRequest::new(PAIR_SYSTEM_PROMPT, user).json().temperature(settings.temperature);
    let response = client.generate(&request).await?;
    Ok(parse_pair_response(&response.text, id))
}
