//! Post-processing for machine transcripts.
//!
//! Speech recognisers pad silence with stock phrases and cut sentences into
//! fragments. [`process_segments`] strips the noise, rebuilds sentences from
//! punctuation, tidies the timing and breaks long lines.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

use super::engine::CharTimeline;
use crate::subtitle::Cue;

const REGROUP_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?', '；', ';'];
const LINE_BREAKS: &[char] = &[',', '.', '!', '?', ';', '，', '。', '！', '？', '；', ' '];
const UNPUNCTUATED_LIMIT: usize = 25;
const UNPUNCTUATED_CHUNK: usize = 15;

const NOISE_PATTERNS: [&str; 20] = [
    r"\[.*?\]",
    r"\(.*?\)",
    r"(\*+)",
    r"♪",
    r"谢谢观看",
    r"请订阅",
    r"字幕由.*提供",
    r"Thank you for watching",
    r"Thanks for watching",
    r"Please subscribe",
    r"Please like and subscribe",
    r"Subtitles by",
    r"Subtitles translated by",
    r"Subtitles managed by",
    r"See you in the next one",
    r"See you in the next video",
    r"I hope you enjoyed this video",
    r"Amara.org",
    r"OpenSubtitles.org",
    r"www\..*?\.(com|org|net)",
];

static NOISE: Lazy<Vec<Regex>> = Lazy::new(|| {
    NOISE_PATTERNS
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .expect("valid noise regex")
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOptions {
    pub max_chars: usize,
    pub min_gap_ms: i64,
    pub min_duration_ms: i64,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            max_chars: 38,
            min_gap_ms: 80,
            min_duration_ms: 500,
        }
    }
}

/// Remove bracketed sound tags, music notes and stock outro phrases
pub fn clean_text(text: &str) -> String {
    NOISE
        .iter()
        .fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
        .trim()
        .to_string()
}

/// Break a long line in two, preferring punctuation near the middle
pub fn split_smartly(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len || text.contains('\n') {
        return text.to_string();
    }

    let mid = chars.len() / 2;
    let best = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| LINE_BREAKS.contains(c))
        .map(|(i, _)| (i, i.abs_diff(mid)))
        .min_by_key(|&(_, dist)| dist);

    let at = match best {
        Some((pos, dist)) if dist < max_len / 3 => pos + 1,
        _ => mid,
    };
    let head: String = chars[..at].iter().collect();
    let tail: String = chars[at..].iter().collect();
    format!("{}\n{}", head.trim(), tail.trim())
}

fn chunk_range((start, end): (usize, usize), timeline: &CharTimeline) -> Vec<(usize, usize)> {
    (start..end)
        .step_by(UNPUNCTUATED_CHUNK)
        .filter_map(|s| {
            let e = (s + UNPUNCTUATED_CHUNK).min(end);
            let mut s = s;
            let mut e = e;
            while s < e && timeline.chars[s].is_whitespace() {
                s += 1;
            }
            while e > s && timeline.chars[e - 1].is_whitespace() {
                e -= 1;
            }
            (s < e).then_some((s, e))
        })
        .collect()
}

/// Rebuild sentences across cue boundaries
///
/// Text without any terminator that runs past 25 characters is cut into
/// 15 character chunks instead.
pub fn global_regroup_by_punctuation(cues: &[Cue]) -> Vec<Cue> {
    let timeline = CharTimeline::build(cues);
    if timeline.is_empty() {
        return cues.to_vec();
    }

    let mut sentences = timeline.sentences(REGROUP_TERMINATORS);
    if let [only] = sentences.as_slice() {
        if only.1 - only.0 > UNPUNCTUATED_LIMIT {
            debug!("No sentence punctuation found, chunking {} chars", only.1 - only.0);
            sentences = chunk_range(*only, &timeline);
        }
    }

    let regrouped: Vec<Cue> = sentences.into_iter().map(|r| timeline.cue(r)).collect();
    if regrouped.is_empty() { cues.to_vec() } else { regrouped }
}

/// Clean, regroup, retime and line-break a transcript
pub fn process_segments(cues: &[Cue], options: &CleanupOptions) -> Vec<Cue> {
    let cleaned: Vec<Cue> = cues
        .iter()
        .filter_map(|cue| {
            let text = clean_text(&cue.text);
            (!text.is_empty()).then(|| Cue::new(cue.start_ms, cue.end_ms, text))
        })
        .collect();
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut segments = global_regroup_by_punctuation(&cleaned);

    for i in 0..segments.len().saturating_sub(1) {
        let next_start = segments[i + 1].start_ms;
        let gap = next_start - segments[i].end_ms;
        if (gap > 0 && gap < options.min_gap_ms) || gap < 0 {
            segments[i].end_ms = next_start;
        }
    }

    for cue in segments.iter_mut() {
        if cue.duration_ms() < options.min_duration_ms {
            cue.end_ms = cue.start_ms + options.min_duration_ms;
        }
        cue.text = split_smartly(&cue.text, options.max_chars);
    }

    info!("Cleaned {} segments into {}", cues.len(), segments.len());
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("[Music] Hello ♪"), "Hello");
        assert_eq!(clean_text("thanks for watching"), "");
        assert_eq!(clean_text("谢谢观看"), "");
        assert_eq!(clean_text("Visit www.example.com now"), "Visit  now");
        assert_eq!(clean_text("(laughs) 好的"), "好的");
    }

    #[test]
    fn test_split_smartly() {
        assert_eq!(split_smartly("short line", 30), "short line");
        assert_eq!(split_smartly("already\nbroken line that is very long indeed", 10), "already\nbroken line that is very long indeed");

        let text = "This is the first half, and this is the second half";
        assert_eq!(split_smartly(text, 30), "This is the first half,\nand this is the second half");

        let unbroken = "一二三四五六七八九十一二三四五六七八九十";
        assert_eq!(split_smartly(unbroken, 10), "一二三四五六七八九十\n一二三四五六七八九十");
    }

    #[test]
    fn test_global_regroup_chunks_unpunctuated_text() {
        let text = "一二三四五六七八九十一二三四五六七八九十一二三四五六七八九十";
        let regrouped = global_regroup_by_punctuation(&[Cue::new(0, 3000, text)]);
        assert_eq!(regrouped.len(), 2);
        assert_eq!(regrouped[0].text.chars().count(), 15);
        assert_eq!((regrouped[0].start_ms, regrouped[0].end_ms), (0, 1500));
        assert_eq!(regrouped[1].end_ms, 3000);
    }

    #[test]
    fn test_global_regroup_splits_on_semicolon() {
        let regrouped = global_regroup_by_punctuation(&[Cue::new(0, 1000, "甲；乙")]);
        assert_eq!(regrouped.len(), 2);
        assert_eq!(regrouped[0].text, "甲；");
    }

    #[test]
    fn test_process_segments() {
        let cues = vec![
            Cue::new(0, 1000, "[Music]"),
            Cue::new(1000, 1300, "你好。"),
            Cue::new(1350, 3000, "今天天气不错。"),
            Cue::new(3000, 4000, "Thanks for watching"),
        ];
        let out = process_segments(&cues, &CleanupOptions::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "你好。");
        // 50ms gap closed, then stretched to the minimum duration
        assert_eq!((out[0].start_ms, out[0].end_ms), (1000, 1500));
        assert_eq!((out[1].start_ms, out[1].end_ms), (1350, 3000));

        assert!(process_segments(&[Cue::new(0, 1, "♪")], &CleanupOptions::default()).is_empty());
    }
}
