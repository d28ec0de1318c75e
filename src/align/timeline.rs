use std::collections::HashSet;
use tracing::{info, warn};

use super::AnchorMode;
use crate::project::{SideEntry, SubtitleRow};
use crate::subtitle::Cue;

/// Spans belong together when one contains the other or the overlap covers
/// at least half of either duration
fn spans_match(a: &SideEntry, b: &SideEntry) -> bool {
    if (b.start >= a.start && b.end <= a.end) || (a.start >= b.start && a.end <= b.end) {
        return true;
    }

    let overlap = a.end.min(b.end) - a.start.max(b.start);
    if overlap <= 0.0 {
        return false;
    }
    let ratio = |entry: &SideEntry| {
        let duration = entry.end - entry.start;
        if duration > 0.0 { overlap / duration } else { 0.0 }
    };
    ratio(a) >= 0.5 || ratio(b) >= 0.5
}

/// Join matched entries in input order into one entry spanning all of them
fn combine(matched: &[&SideEntry]) -> SideEntry {
    let text = matched.iter().map(|e| e.text.as_str()).collect::<Vec<_>>().join("\n");
    let start = matched[0].start;
    let end = matched.iter().map(|e| e.end).fold(matched[0].end, f64::max);
    SideEntry::new(text, start, end)
}

fn entries(cues: &[Cue]) -> Vec<SideEntry> {
    cues.iter().map(SideEntry::from_cue).collect()
}

/// Build rows from two timed subtitle tracks
pub fn align_subtitles(source: &[Cue], target: &[Cue], mode: AnchorMode) -> Vec<SubtitleRow> {
    let source = entries(source);
    let target = entries(target);
    match mode.resolve() {
        AnchorMode::Target => align_target_anchored(&source, &target),
        _ => align_source_anchored(&source, &target),
    }
}

fn align_source_anchored(source: &[SideEntry], target: &[SideEntry]) -> Vec<SubtitleRow> {
    let mut used: HashSet<usize> = HashSet::new();
    let mut rows = Vec::with_capacity(source.len());

    for s in source {
        let matched: Vec<usize> = target
            .iter()
            .enumerate()
            .filter(|(i, t)| !used.contains(i) && spans_match(s, t))
            .map(|(i, _)| i)
            .collect();

        if matched.is_empty() {
            rows.push(SubtitleRow::new(s.clone(), SideEntry::new("", s.start, s.end)));
            continue;
        }

        let merged = combine(&matched.iter().map(|&i| &target[i]).collect::<Vec<_>>());
        used.extend(matched);
        rows.push(SubtitleRow::new(s.clone(), merged));
    }

    info!(
        "Source-anchored alignment: {} rows, {} target cues matched",
        rows.len(),
        used.len()
    );
    let unmatched = target.len() - used.len();
    if unmatched > 0 {
        warn!("{} target cues were not matched to any source cue", unmatched);
    }
    rows
}

fn align_target_anchored(source: &[SideEntry], target: &[SideEntry]) -> Vec<SubtitleRow> {
    let rows: Vec<SubtitleRow> = target
        .iter()
        .map(|t| {
            let matched: Vec<&SideEntry> = source.iter().filter(|s| spans_match(s, t)).collect();
            let merged = if matched.is_empty() {
                SideEntry::new("", t.start, t.end)
            } else {
                combine(&matched)
            };
            SubtitleRow::new(merged, t.clone())
        })
        .collect();

    let merged = merge_consecutive_sources(rows);
    let with_source = merged.iter().filter(|r| !r.source.is_empty()).count();
    info!(
        "Target-anchored alignment: {} rows after merging, {} with source text",
        merged.len(),
        with_source
    );
    merged
}

/// Collapse runs of rows that share the same non-empty source text
fn merge_consecutive_sources(rows: Vec<SubtitleRow>) -> Vec<SubtitleRow> {
    let mut merged: Vec<SubtitleRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match merged.last_mut() {
            Some(last) if !row.source.is_empty() && last.source.text == row.source.text => {
                last.target.text = format!("{}\n{}", last.target.text, row.target.text);
                last.target.end = last.target.end.max(row.target.end);
            }
            _ => merged.push(row),
        }
    }
    merged
}

/// Pair lines by index, padding the shorter side with empty text
pub fn align_by_line_count<S: AsRef<str>>(source: &[S], target: &[S]) -> Vec<(String, String)> {
    let len = source.len().max(target.len());
    let text = |lines: &[S], i: usize| lines.get(i).map(|s| s.as_ref().to_string()).unwrap_or_default();
    let aligned: Vec<(String, String)> = (0..len).map(|i| (text(source, i), text(target, i))).collect();
    info!("Line-count alignment: {} rows", aligned.len());
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cue(start: i64, end: i64, text: &str) -> Cue {
        Cue::new(start, end, text)
    }

    #[test]
    fn test_source_anchored_joins_split_targets() {
        let source = vec![cue(0, 4000, "Hello there, friend"), cue(5000, 6000, "Bye")];
        let target = vec![cue(0, 2000, "你好"), cue(2000, 4100, "朋友"), cue(9000, 9500, "多余")];

        let rows = align_subtitles(&source, &target, AnchorMode::Source);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].target.text, "你好\n朋友");
        assert_eq!(rows[0].target.start, 0.0);
        assert_eq!(rows[0].target.end, 4.1);
        assert_eq!(rows[1].target.text, "");
        assert_eq!(rows[1].target.start, 5.0);
    }

    #[test]
    fn test_target_cue_used_once() {
        let source = vec![cue(0, 2000, "A"), cue(0, 2000, "B")];
        let target = vec![cue(0, 2000, "甲")];
        let rows = align_subtitles(&source, &target, AnchorMode::Auto);
        assert_eq!(rows[0].target.text, "甲");
        assert!(rows[1].target.is_empty());
    }

    #[test]
    fn test_small_overlap_does_not_match() {
        let source = vec![cue(0, 1000, "A")];
        let target = vec![cue(800, 2000, "甲")];
        let rows = align_subtitles(&source, &target, AnchorMode::Source);
        assert!(rows[0].target.is_empty());
    }

    #[test]
    fn test_target_anchored_merges_repeated_source() {
        let source = vec![cue(0, 4000, "Long English line"), cue(5000, 6000, "Next")];
        let target = vec![cue(0, 2000, "前半"), cue(2000, 4000, "后半"), cue(5000, 6000, "下一句"), cue(8000, 9000, "孤立")];

        let rows = align_subtitles(&source, &target, AnchorMode::Target);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].source.text, "Long English line");
        assert_eq!(rows[0].target.text, "前半\n后半");
        assert_eq!(rows[0].target.end, 4.0);
        assert_eq!(rows[1].target.text, "下一句");
        assert!(rows[2].source.is_empty());
        assert_eq!(rows[2].source.start, 8.0);
    }

    #[test]
    fn test_align_by_line_count_pads() {
        let aligned = align_by_line_count(&["a", "b", "c"], &["一"]);
        assert_eq!(aligned[0], ("a".to_string(), "一".to_string()));
        assert_eq!(aligned[2], ("c".to_string(), String::new()));
    }
}
