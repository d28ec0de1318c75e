use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

use super::AnchorMode;
use super::timeline::align_by_line_count;
use crate::error::{KaocheError, Result};
use crate::llm::{LlmClient, LlmRequest, parse_json_from_response};
use crate::project::{SideEntry, SubtitleRow};
use crate::prompts::{ALIGNMENT, FILL_GAPS, PromptStore};

const CONTEXT_WINDOW: usize = 10;
const CONTEXT_TEXT_CHARS: usize = 50;

fn numbered<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| format!("{}. {}", i + 1, l.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str) -> String {
    if text.chars().count() > CONTEXT_TEXT_CHARS {
        format!("{}...", text.chars().take(CONTEXT_TEXT_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

fn pairs_from_value(value: &serde_json::Value) -> Option<Vec<(String, String)>> {
    let field = |item: &serde_json::Value, key: &str| {
        item.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
    };
    value
        .as_array()
        .map(|items| items.iter().map(|item| (field(item, "source"), field(item, "target"))).collect())
}

/// Send an alignment request and read back `[{"source", "target"}]`
async fn request_pairs(client: &dyn LlmClient, system: String, user: String) -> Result<Vec<(String, String)>> {
    let request = LlmRequest::new(system, user).json();
    let response = client.generate(&request).await?;
    parse_json_from_response(&response.text)
        .as_ref()
        .and_then(pairs_from_value)
        .ok_or_else(|| KaocheError::Alignment("LLM response contained no JSON array".to_string()))
}

/// Pair lines by meaning; falls back to index pairing when the LLM fails
pub async fn align_with_llm(
    client: &dyn LlmClient,
    prompts: &PromptStore,
    source: &[String],
    target: &[String],
    mode: AnchorMode,
) -> Vec<(String, String)> {
    info!("Starting LLM alignment: {} source lines, {} target lines", source.len(), target.len());

    let anchor = match mode.resolve() {
        AnchorMode::Target => "Use the translated lines as the anchor.",
        _ => "Use the source lines as the anchor.",
    };
    let user = format!(
        "Align these subtitles.\n\nSource subtitles ({} lines):\n{}\n\nTranslated subtitles ({} lines):\n{}\n\n{}\nReturn the aligned JSON array.",
        source.len(),
        numbered(source),
        target.len(),
        numbered(target),
        anchor
    );

    let result = match prompts.load(ALIGNMENT) {
        Ok(system) => request_pairs(client, system, user).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(pairs) => {
            info!("LLM alignment produced {} pairs", pairs.len());
            pairs
        }
        Err(e) => {
            error!("LLM alignment failed: {}", e);
            warn!("Falling back to line-count alignment");
            align_by_line_count(source, target)
        }
    }
}

fn context_block(context: &[(String, String)]) -> String {
    let line = |i: usize, (src, tgt): &(String, String)| {
        format!("{}. Source: {} -> Target: {}", i + 1, truncate(src), truncate(tgt))
    };
    let mut lines: Vec<String> = context
        .iter()
        .take(CONTEXT_WINDOW)
        .enumerate()
        .map(|(i, pair)| line(i, pair))
        .collect();
    if context.len() > CONTEXT_WINDOW {
        lines.push("...".to_string());
        let tail_start = CONTEXT_WINDOW.max(context.len() - CONTEXT_WINDOW);
        lines.extend(
            context[tail_start..]
                .iter()
                .enumerate()
                .map(|(i, pair)| line(tail_start + i, pair)),
        );
    }
    lines.join("\n")
}

async fn align_with_context(
    client: &dyn LlmClient,
    system: &str,
    sources: &[String],
    targets: &[String],
    context: &[(String, String)],
) -> Vec<(String, String)> {
    let user = format!(
        "Reference pairs that are already aligned:\n{}\n\nUnmatched source lines ({}):\n{}\n\nUnmatched translated lines ({}):\n{}\n\nReturn the aligned JSON array: [{{\"source\": \"...\", \"target\": \"...\"}}]",
        context_block(context),
        sources.len(),
        numbered(sources),
        targets.len(),
        numbered(targets)
    );

    match request_pairs(client, system.to_string(), user).await {
        Ok(pairs) => {
            info!("LLM returned {} gap-fill pairs", pairs.len());
            pairs
        }
        Err(e) => {
            error!("LLM gap filling failed: {}", e);
            align_by_line_count(sources, targets)
        }
    }
}

fn is_half_empty(row: &SubtitleRow) -> bool {
    row.source.is_empty() || row.target.is_empty()
}

/// Texts not yet placed in any row; a merged row counts each of its lines
fn unmatched(all: &[String], placed: &[&str]) -> Vec<String> {
    let placed_lines: HashSet<&str> = placed.iter().flat_map(|t| t.lines()).map(str::trim).collect();
    all.iter()
        .filter(|text| !text.trim().is_empty())
        .filter(|text| !text.lines().all(|l| placed_lines.contains(l.trim())))
        .cloned()
        .collect()
}

/// Fill rows the timeline pass left half empty, pairing leftovers by meaning
///
/// Each attempt recomputes which texts are still unplaced, asks the LLM in
/// batches with surrounding aligned pairs as context, then writes answers into
/// the half-empty rows in order. Extra answers become new rows.
///
/// `cancelled` is checked before every LLM batch; once set, answers received
/// so far are merged and no further requests are made.
#[allow(clippy::too_many_arguments)]
pub async fn fill_alignment_gaps(
    client: &dyn LlmClient,
    prompts: &PromptStore,
    rows: Vec<SubtitleRow>,
    all_source: &[String],
    all_target: &[String],
    max_retries: u32,
    batch_size: usize,
    cancelled: &AtomicBool,
) -> Vec<SubtitleRow> {
    let system = match prompts.load(FILL_GAPS) {
        Ok(system) => system,
        Err(e) => {
            error!("Cannot fill alignment gaps: {}", e);
            return rows;
        }
    };
    let batch_size = batch_size.max(1);
    let mut current = rows;

    for attempt in 0..max_retries {
        let empty = current.iter().filter(|r| is_half_empty(r)).count();
        if empty == 0 {
            info!("No alignment gaps left after {} attempts", attempt);
            return current;
        }
        info!("Found {} alignment gaps (attempt {})", empty, attempt + 1);

        let placed_source: Vec<&str> = current.iter().map(|r| r.source.text.as_str()).collect();
        let placed_target: Vec<&str> = current.iter().map(|r| r.target.text.as_str()).collect();
        let sources = unmatched(all_source, &placed_source);
        let targets = unmatched(all_target, &placed_target);
        if sources.is_empty() && targets.is_empty() {
            info!("Every line is already placed");
            return current;
        }

        let context: Vec<(String, String)> = current
            .iter()
            .filter(|r| !is_half_empty(r))
            .map(|r| (r.source.text.clone(), r.target.text.clone()))
            .collect();

        let mut answers = Vec::new();
        let batches = sources.len().max(targets.len()).div_ceil(batch_size);
        for batch in 0..batches {
            if cancelled.load(Ordering::SeqCst) {
                info!("Gap filling cancelled before batch {}", batch + 1);
                return merge_answers(current, answers);
            }
            let range = |lines: &[String]| {
                let start = (batch * batch_size).min(lines.len());
                let end = (start + batch_size).min(lines.len());
                lines[start..end].to_vec()
            };
            let (batch_sources, batch_targets) = (range(&sources), range(&targets));
            info!(
                "Filling batch {} ({} source, {} target lines)",
                batch + 1,
                batch_sources.len(),
                batch_targets.len()
            );
            answers.extend(align_with_context(client, &system, &batch_sources, &batch_targets, &context).await);
        }

        current = merge_answers(current, answers);
        info!("Gap filling attempt {} complete: {} rows", attempt + 1, current.len());
    }

    let remaining = current.iter().filter(|r| is_half_empty(r)).count();
    if remaining > 0 {
        warn!("Reached {} attempts with {} gaps remaining", max_retries, remaining);
    }
    current
}

fn merge_answers(rows: Vec<SubtitleRow>, answers: Vec<(String, String)>) -> Vec<SubtitleRow> {
    let mut answers = answers.into_iter();
    let mut merged = Vec::with_capacity(rows.len());

    for mut row in rows {
        match (row.source.is_empty(), row.target.is_empty()) {
            (true, true) => continue,
            (true, false) => {
                if let Some((source, _)) = answers.next() {
                    row.source.text = source;
                }
            }
            (false, true) => {
                if let Some((_, target)) = answers.next() {
                    row.target.text = target;
                }
            }
            (false, false) => {}
        }
        merged.push(row);
    }

    merged.extend(
        answers.map(|(source, target)| SubtitleRow::new(SideEntry::new(source, 0.0, 0.0), SideEntry::new(target, 0.0, 0.0))),
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient, Usage};

    fn reply(text: &str) -> LlmResponse {
        LlmResponse {
            text: text.to_string(),
            model: "mock".to_string(),
            usage: Usage::default(),
        }
    }

    fn row(source: &str, target: &str) -> SubtitleRow {
        SubtitleRow::new(SideEntry::new(source, 1.0, 2.0), SideEntry::new(target, 1.0, 2.0))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_align_with_llm() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .withf(|req| req.json_mode && req.user.contains("1. Hello"))
            .returning(|_| Ok(reply(r#"```json
[{"source": "Hello", "target": "你好"}, {"source": "World", "target": ""}]
```"#)));

        let pairs = align_with_llm(
            &mock,
            &PromptStore::default(),
            &strings(&["Hello", "World"]),
            &strings(&["你好"]),
            AnchorMode::Source,
        )
        .await;
        assert_eq!(pairs, vec![("Hello".into(), "你好".into()), ("World".into(), String::new())]);
    }

    #[tokio::test]
    async fn test_align_with_llm_falls_back() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .returning(|_| Err(KaocheError::Llm("offline".to_string())));

        let pairs = align_with_llm(&mock, &PromptStore::default(), &strings(&["A"]), &strings(&["甲", "乙"]), AnchorMode::Target).await;
        assert_eq!(pairs, vec![("A".into(), "甲".into()), (String::new(), "乙".into())]);
    }

    #[tokio::test]
    async fn test_fill_gaps_writes_into_empty_sides() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .times(1)
            .withf(|req| req.user.contains("Unmatched translated lines (1)") && req.user.contains("1. 再见"))
            .returning(|_| Ok(reply(r#"[{"source": "Goodbye", "target": "再见"}]"#)));

        let rows = vec![row("Hello", "你好"), row("Goodbye", ""), row("", "")];
        let filled = fill_alignment_gaps(
            &mock,
            &PromptStore::default(),
            rows,
            &strings(&["Hello", "Goodbye"]),
            &strings(&["你好", "再见"]),
            3,
            10,
            &AtomicBool::new(false),
        )
        .await;

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[1].target.text, "再见");
        assert_eq!(filled[1].target.start, 1.0);
    }

    #[tokio::test]
    async fn test_fill_gaps_appends_leftovers_and_stops_when_nothing_unplaced() {
        let mut mock = MockLlmClient::new();
        mock.expect_generate()
            .times(1)
            .returning(|_| Ok(reply(r#"[{"source": "", "target": "甲"}, {"source": "Extra", "target": "额外"}]"#)));

        let rows = vec![row("A", "")];
        let filled = fill_alignment_gaps(
            &mock,
            &PromptStore::default(),
            rows,
            &strings(&["A", "Extra"]),
            &strings(&["甲", "额外"]),
            5,
            10,
            &AtomicBool::new(false),
        )
        .await;

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].target.text, "甲");
        assert_eq!(filled[1].source.text, "Extra");
        assert_eq!(filled[1].source.end, 0.0);
    }

    #[tokio::test]
    async fn test_fill_gaps_stops_between_batches_when_cancelled() {
        let cancelled = std::sync::Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let mut mock = MockLlmClient::new();
        mock.expect_generate().times(1).returning(move |_| {
            flag.store(true, Ordering::SeqCst);
            Ok(reply(r#"[{"source": "B", "target": "乙"}]"#))
        });

        let rows = vec![row("A", "甲"), row("B", ""), row("C", "")];
        let filled = fill_alignment_gaps(
            &mock,
            &PromptStore::default(),
            rows,
            &strings(&["A", "B", "C"]),
            &strings(&["甲", "乙", "丙"]),
            3,
            1,
            &cancelled,
        )
        .await;

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[1].target.text, "乙");
        assert!(filled[2].target.is_empty());
    }

    #[test]
    fn test_context_block_windows() {
        let context: Vec<(String, String)> = (0..25).map(|i| (format!("s{}", i), format!("t{}", i))).collect();
        let block = context_block(&context);
        assert!(block.contains("1. Source: s0"));
        assert!(block.contains("...\n16. Source: s15"));
        assert!(!block.contains("s12 "));
        assert_eq!(truncate(&"x".repeat(60)), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn test_unmatched_counts_merged_lines() {
        let left = unmatched(&strings(&["A", "B", "C"]), &["A\nB"]);
        assert_eq!(left, vec!["C".to_string()]);
    }
}
