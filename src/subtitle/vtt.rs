use super::Cue;
use super::srt::{parse_timing_line, strip_markup};
use super::time::format_vtt_time;
use crate::error::{KaocheError, Result};

pub fn parse_vtt(content: &str) -> Result<Vec<Cue>> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = normalized.trim_start_matches('\u{feff}');

    if !normalized.trim_start().starts_with("WEBVTT") {
        return Err(KaocheError::Parse("Missing WEBVTT header".to_string()));
    }

    let mut cues = Vec::new();
    for block in normalized.split("\n\n").skip(1) {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        let Some(first) = lines.first() else {
            continue;
        };
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            continue;
        }

        let Some(timing_index) = lines.iter().position(|l| l.contains("-->")) else {
            continue;
        };
        let (start_ms, end_ms) = parse_timing_line(lines[timing_index]).ok_or_else(|| {
            KaocheError::Parse(format!("Invalid VTT timing line: {}", lines[timing_index]))
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

pub fn to_vtt(cues: &[Cue]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for cue in cues {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_time(cue.start_ms),
            format_vtt_time(cue.end_ms),
            cue.text.trim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vtt_with_settings_and_notes() {
        let content = "WEBVTT\n\nNOTE this is a comment\n\nintro\n00:01.000 --> 00:02.000 align:start\n<v Roger>Hi there\n\n00:00:03.000 --> 00:00:04.250\nLine one\nLine two\n";
        let cues = parse_vtt(content).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].start_ms, 1_000);
        assert_eq!(cues[0].text, "Hi there");
        assert_eq!(cues[1].end_ms, 4_250);
        assert_eq!(cues[1].text, "Line one\nLine two");
    }

    #[test]
    fn test_missing_header() {
        assert!(parse_vtt("00:01.000 --> 00:02.000\nHi").is_err());
    }

    #[test]
    fn test_write_vtt() {
        let out = to_vtt(&[Cue::new(1_000, 2_000, "Hi")]);
        assert_eq!(out, "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHi\n\n");
    }
}
