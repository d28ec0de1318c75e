use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::Cue;
use super::time::{format_srt_time, parse_timestamp};
use crate::error::{KaocheError, Result};

static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid block separator regex"));

static MARKUP_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>|\{\\[^}]*\}").expect("valid markup regex"));

/// Remove HTML-like markup and inline ASS override tags
pub fn strip_markup(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").to_string()
}

/// Parse a `start --> end` line, ignoring trailing cue settings
pub(crate) fn parse_timing_line(line: &str) -> Option<(i64, i64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start)?, parse_timestamp(end)?))
}

pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut cues = Vec::new();

    for block in BLOCK_SEPARATOR.split(&normalized) {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            continue;
        }

        // Sequence numbers are optional in the wild
        let timing_index = match lines.iter().position(|l| l.contains("-->")) {
            Some(i) if i <= 1 => i,
            _ => {
                debug!("Skipping SRT block without timing: {:?}", lines.first());
                continue;
            }
        };

        let (start_ms, end_ms) = parse_timing_line(lines[timing_index]).ok_or_else(|| {
            KaocheError::Parse(format!("Invalid SRT timing line: {}", lines[timing_index]))
        })?;

        let text = lines[timing_index + 1..]
            .iter()
            .map(|l| strip_markup(l.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        cues.push(Cue::new(start_ms, end_ms, text.trim()));
    }

    Ok(cues)
}

pub fn to_srt(cues: &[Cue]) -> String {
    let mut srt_content = String::new();

    for (index, cue) in cues.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
            cue.text.trim()
        ));
    }

    srt_content
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\r\n00:00:01,000 --> 00:00:02,500\r\n<i>Hello</i>\r\nworld\r\n\r\n2\r\n00:00:03,000 --> 00:00:04,000\r\n{\\an8}Second\r\n";

    #[test]
    fn test_parse_srt() {
        let cues = parse_srt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start_ms, 1_000);
        assert_eq!(cues[0].end_ms, 2_500);
        assert_eq!(cues[0].text, "Hello\nworld");
        assert_eq!(cues[1].text, "Second");
    }

    #[test]
    fn test_whitespace_only_separator_lines() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n  \t\n2\n00:00:03,000 --> 00:00:04,000\nSecond\n \n\n3\n00:00:05,000 --> 00:00:06,000\nThird\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].text, "First");
        assert_eq!(cues[1].start_ms, 3_000);
        assert_eq!(cues[2].text, "Third");
    }

    #[test]
    fn test_write_srt() {
        let cues = vec![Cue::new(0, 1_200, "Hi"), Cue::new(65_123, 66_000, "Bye")];
        let out = to_srt(&cues);
        assert!(out.starts_with("1\n00:00:00,000 --> 00:00:01,200\nHi\n\n2\n"));
        assert!(out.contains("00:01:05,123 --> 00:01:06,000\nBye"));
    }

    #[test]
    fn test_bad_timing_is_error() {
        assert!(parse_srt("1\n00:00:xx,000 --> 00:00:02,000\nText\n").is_err());
    }
}
