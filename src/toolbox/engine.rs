use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{KaocheError, Result};
use crate::subtitle::{Cue, load_subtitle};

const CONCAT_GAP_MS: i64 = 500;
const TXT_MS_PER_CHAR: i64 = 150;
const TXT_GAP_MS: i64 = 200;
const SENTENCE_END: &[char] = &['。', '！', '？', '.', '!', '?'];
const BREAK_POINTS: [&str; 8] = ["，", "。", "！", "？", ", ", ". ", "! ", "? "];

static ZH_THEN_LATIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([一-龥]+)\s*([a-zA-Z\s,.'!?]+)").expect("valid bilingual split regex"));

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Characters of a cue list with an estimated time span for each
///
/// Each cue's duration is spread evenly over its characters. Cues are
/// joined with a space when neither side of the seam is CJK.
pub(crate) struct CharTimeline {
    pub chars: Vec<char>,
    times: Vec<(f64, f64)>,
}

impl CharTimeline {
    pub fn build(cues: &[Cue]) -> Self {
        let mut chars: Vec<char> = Vec::new();
        let mut times: Vec<(f64, f64)> = Vec::new();

        for cue in cues {
            let text: Vec<char> = cue.text.replace('\n', " ").trim().chars().collect();
            if text.is_empty() {
                continue;
            }
            if let (Some(&last), Some(&first)) = (chars.last(), text.first()) {
                if !last.is_whitespace() && !is_cjk(last) && !is_cjk(first) {
                    let at = times.last().map(|t| t.1).unwrap_or(cue.start_ms as f64);
                    chars.push(' ');
                    times.push((at, at));
                }
            }

            let n = text.len() as f64;
            let duration = cue.duration_ms() as f64;
            let base = cue.start_ms as f64;
            for (i, c) in text.into_iter().enumerate() {
                chars.push(c);
                times.push((base + duration * i as f64 / n, base + duration * (i + 1) as f64 / n));
            }
        }
        Self { chars, times }
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Ranges ending at each terminator, whitespace trimmed, empties dropped
    pub fn sentences(&self, terminators: &[char]) -> Vec<(usize, usize)> {
        let mut raw = Vec::new();
        let mut start = 0;
        for (i, c) in self.chars.iter().enumerate() {
            if terminators.contains(c) {
                raw.push((start, i + 1));
                start = i + 1;
            }
        }
        if start < self.chars.len() {
            raw.push((start, self.chars.len()));
        }

        raw.into_iter()
            .filter_map(|(mut s, mut e)| {
                while s < e && self.chars[s].is_whitespace() {
                    s += 1;
                }
                while e > s && self.chars[e - 1].is_whitespace() {
                    e -= 1;
                }
                (s < e).then_some((s, e))
            })
            .collect()
    }

    pub fn cue(&self, (start, end): (usize, usize)) -> Cue {
        let text: String = self.chars[start..end].iter().collect();
        Cue::new(self.times[start].0 as i64, self.times[end - 1].1 as i64, text)
    }
}

/// Join files end to end, each starting half a second after the previous one ends
pub fn concat<P: AsRef<Path>>(files: &[P]) -> Result<Vec<Cue>> {
    let mut combined: Vec<Cue> = Vec::new();
    let mut offset = 0i64;

    for path in files {
        let doc = load_subtitle(path)?;
        let added = doc.cues.len();
        combined.extend(doc.cues.into_iter().map(|mut cue| {
            cue.start_ms += offset;
            cue.end_ms += offset;
            cue
        }));
        if added > 0 {
            offset = combined.last().map(|c| c.end_ms).unwrap_or(offset) + CONCAT_GAP_MS;
        }
        debug!("Appended {} cues from {}", added, path.as_ref().display());
    }

    info!("Concatenated {} files into {} cues", files.len(), combined.len());
    Ok(combined)
}

/// Split two-language cues into two tracks with the same timing
///
/// A line break separates the languages when present; otherwise a Chinese
/// run followed by Latin text is split apart. Anything else stays whole on
/// the first track.
pub fn split_bilingual(cues: &[Cue]) -> (Vec<Cue>, Vec<Cue>) {
    cues.iter()
        .map(|cue| {
            let text = cue.text.trim();
            let (first, second) = match text.split_once('\n') {
                Some((a, b)) => (a.trim().to_string(), b.trim().to_string()),
                None => match ZH_THEN_LATIN.captures(text) {
                    Some(caps) => (caps[1].trim().to_string(), caps[2].trim().to_string()),
                    None => (text.to_string(), String::new()),
                },
            };
            let mut a = cue.clone();
            a.text = first;
            let mut b = cue.clone();
            b.text = second;
            (a, b)
        })
        .unzip()
}

/// Append each cue of `other` below the matching cue of `base`
pub fn merge_bilingual(base: &[Cue], other: &[Cue]) -> Vec<Cue> {
    let mut merged = base.to_vec();
    for (cue, extra) in merged.iter_mut().zip(other) {
        cue.text = format!("{}\n{}", cue.text, extra.text);
    }
    merged
}

/// Re-cut cues at sentence punctuation, interpolating times per character
pub fn regroup_by_punctuation(cues: &[Cue]) -> Vec<Cue> {
    let timeline = CharTimeline::build(cues);
    if timeline.is_empty() {
        return cues.to_vec();
    }
    let regrouped: Vec<Cue> = timeline
        .sentences(SENTENCE_END)
        .into_iter()
        .map(|range| timeline.cue(range))
        .collect();
    info!("Regrouped {} cues into {} sentences", cues.len(), regrouped.len());
    if regrouped.is_empty() { cues.to_vec() } else { regrouped }
}

/// One cue per non-empty line; longer lines stay up longer
pub fn txt_to_srt(text: &str, interval_ms: i64) -> Vec<Cue> {
    let mut current = 0i64;
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let duration = interval_ms + line.chars().count() as i64 * TXT_MS_PER_CHAR;
            let cue = Cue::new(current, current + duration, line);
            current += duration + TXT_GAP_MS;
            cue
        })
        .collect()
}

/// Move every cue by `offset_ms`; times never go below zero
pub fn shift(cues: &mut [Cue], offset_ms: i64) {
    for cue in cues.iter_mut() {
        cue.start_ms = (cue.start_ms + offset_ms).max(0);
        cue.end_ms = (cue.end_ms + offset_ms).max(0);
    }
}

pub fn strip_timeline(cues: &[Cue]) -> String {
    cues.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join("\n")
}

/// Keep cues fully inside the window, rebased to its start
pub fn crop(cues: &[Cue], start_ms: i64, end_ms: i64) -> Vec<Cue> {
    cues.iter()
        .filter(|c| c.start_ms >= start_ms && c.end_ms <= end_ms)
        .map(|c| {
            let mut cue = c.clone();
            cue.start_ms -= start_ms;
            cue.end_ms -= start_ms;
            cue
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFilter {
    ChineseOnly,
    EnglishOnly,
}

impl FromStr for TextFilter {
    type Err = KaocheError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chinese" | "chinese_only" | "zh" => Ok(Self::ChineseOnly),
            "english" | "english_only" | "en" => Ok(Self::EnglishOnly),
            _ => Err(KaocheError::InvalidArgument(format!(
                "Invalid filter '{}'. Use 'chinese' or 'english'",
                s
            ))),
        }
    }
}

/// Keep only Chinese characters, or only Latin letters with single spaces between words
pub fn filter_text(cues: &mut [Cue], filter: TextFilter) {
    for cue in cues.iter_mut() {
        cue.text = match filter {
            TextFilter::ChineseOnly => cue.text.chars().filter(|c| is_cjk(*c)).collect(),
            TextFilter::EnglishOnly => cue
                .text
                .split(|c: char| !c.is_ascii_alphabetic())
                .filter(|w| !w.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        };
    }
}

/// Apply replacements in order to every cue
pub fn batch_replace(cues: &mut [Cue], replacements: &[(String, String)]) {
    for cue in cues.iter_mut() {
        for (from, to) in replacements.iter().filter(|(from, _)| !from.is_empty()) {
            cue.text = cue.text.replace(from.as_str(), to.as_str());
        }
    }
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Split after the first inner occurrence of a break mark, else at a space past the middle
fn split_point(chars: &[char], max_chars: usize) -> Option<usize> {
    for point in BREAK_POINTS {
        let needle: Vec<char> = point.chars().collect();
        // only the first occurrence of each mark counts
        if let Some(idx) = find_chars(chars, &needle, 0) {
            if idx > 0 && idx + 1 < chars.len() {
                return Some(idx + needle.len());
            }
        }
    }
    find_chars(chars, &[' '], max_chars / 2)
}

/// Split cues longer than `max_chars` in two at a punctuation mark or space
pub fn fix_long_sentences(cues: &[Cue], max_chars: usize) -> Vec<Cue> {
    let mut fixed = Vec::with_capacity(cues.len());
    for cue in cues {
        let chars: Vec<char> = cue.text.chars().collect();
        if chars.len() > max_chars {
            if let Some(at) = split_point(&chars, max_chars) {
                let first: String = chars[..at].iter().collect::<String>().trim().to_string();
                let second: String = chars[at..].iter().collect::<String>().trim().to_string();
                if !first.is_empty() && !second.is_empty() {
                    let mid = cue.start_ms + cue.duration_ms() / 2;
                    let mut head = cue.clone();
                    head.end_ms = mid;
                    head.text = first;
                    let mut tail = cue.clone();
                    tail.start_ms = mid;
                    tail.text = second;
                    fixed.push(head);
                    fixed.push(tail);
                    continue;
                }
            }
        }
        fixed.push(cue.clone());
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn cue(start: i64, end: i64, text: &str) -> Cue {
        Cue::new(start, end, text)
    }

    #[test]
    fn test_concat_offsets() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.srt");
        let b = dir.path().join("b.srt");
        std::fs::write(&a, "1\n00:00:01,000 --> 00:00:02,000\nOne\n\n").unwrap();
        std::fs::write(&b, "1\n00:00:00,500 --> 00:00:01,000\nTwo\n\n").unwrap();

        let cues = concat(&[&a, &b]).unwrap();
        assert_eq!(cues[1].start_ms, 3000);
        assert_eq!(cues[1].end_ms, 3500);
    }

    #[test]
    fn test_split_bilingual() {
        let cues = vec![cue(0, 1, "你好\nHello"), cue(1, 2, "谢谢 Thank you!"), cue(2, 3, "只有中文")];
        let (a, b) = split_bilingual(&cues);
        assert_eq!((a[0].text.as_str(), b[0].text.as_str()), ("你好", "Hello"));
        assert_eq!((a[1].text.as_str(), b[1].text.as_str()), ("谢谢", "Thank you!"));
        assert_eq!((a[2].text.as_str(), b[2].text.as_str()), ("只有中文", ""));
        assert_eq!(b[1].start_ms, 1);
    }

    #[test]
    fn test_merge_bilingual_keeps_extra_base_cues() {
        let merged = merge_bilingual(&[cue(0, 1, "A"), cue(1, 2, "B")], &[cue(0, 1, "甲")]);
        assert_eq!(merged[0].text, "A\n甲");
        assert_eq!(merged[1].text, "B");
    }

    #[test]
    fn test_regroup_by_punctuation() {
        let cues = vec![cue(0, 1000, "Hello world. How"), cue(1000, 2000, "are you?")];
        let regrouped = regroup_by_punctuation(&cues);
        assert_eq!(regrouped.len(), 2);
        assert_eq!(regrouped[0].text, "Hello world.");
        assert_eq!((regrouped[0].start_ms, regrouped[0].end_ms), (0, 750));
        assert_eq!(regrouped[1].text, "How are you?");
        assert_eq!((regrouped[1].start_ms, regrouped[1].end_ms), (812, 2000));
    }

    #[test]
    fn test_regroup_chinese_has_no_added_spaces() {
        let regrouped = regroup_by_punctuation(&[cue(0, 400, "你好。我是"), cue(400, 600, "小明")]);
        assert_eq!(regrouped[1].text, "我是小明");
    }

    #[test]
    fn test_txt_to_srt() {
        let cues = txt_to_srt("ab\n\n  abcd  \n", 1000);
        assert_eq!((cues[0].start_ms, cues[0].end_ms), (0, 1300));
        assert_eq!((cues[1].start_ms, cues[1].end_ms), (1500, 3100));
        assert_eq!(cues[1].text, "abcd");
    }

    #[test]
    fn test_shift_crop_strip() {
        let mut cues = vec![cue(100, 900, "a"), cue(2000, 3000, "b"), cue(3500, 5000, "c")];
        shift(&mut cues, -500);
        assert_eq!((cues[0].start_ms, cues[0].end_ms), (0, 400));

        let cropped = crop(&cues, 1000, 4000);
        assert_eq!(cropped.len(), 1);
        assert_eq!((cropped[0].start_ms, cropped[0].end_ms), (500, 1500));
        assert_eq!(strip_timeline(&cues), "a\nb\nc");
    }

    #[test]
    fn test_filter_and_replace() {
        let mut cues = vec![cue(0, 1, "Hello, 世界 world!")];
        let mut english = cues.clone();
        filter_text(&mut cues, TextFilter::ChineseOnly);
        assert_eq!(cues[0].text, "世界");
        filter_text(&mut english, TextFilter::EnglishOnly);
        assert_eq!(english[0].text, "Hello world");
        assert!("french".parse::<TextFilter>().is_err());

        let mut cues = vec![cue(0, 1, "colour and colour")];
        batch_replace(&mut cues, &[("colour".into(), "color".into()), ("".into(), "x".into())]);
        assert_eq!(cues[0].text, "color and color");
    }

    #[test]
    fn test_fix_long_sentences() {
        let long = "这是一句非常长的字幕，我们需要通过智能断句功能来处理它看看效果如何";
        let fixed = fix_long_sentences(&[cue(0, 4000, long)], 20);
        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].text, "这是一句非常长的字幕，");
        assert_eq!(fixed[1].start_ms, 2000);

        let words = "one two three four five six seven eight nine ten eleven";
        let fixed = fix_long_sentences(&[cue(0, 1000, words)], 20);
        assert_eq!(fixed[0].text, "one two three");
        assert_eq!(fixed[1].text, "four five six seven eight nine ten eleven");

        let short = fix_long_sentences(&[cue(0, 1000, "short")], 20);
        assert_eq!(short[0].text, "short");
    }
}
