use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::style::{AssStyle, STYLE_FORMAT};
use super::time::{format_ass_time, parse_timestamp};
use super::{Cue, SubtitleDocument, SubtitleFormat};
use crate::error::{KaocheError, Result};

static OVERRIDE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("valid override regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

const EVENT_FORMAT: &str = "Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// Plain text of an event: overrides removed, hard breaks become newlines
pub fn ass_to_plain(text: &str) -> String {
    OVERRIDE_BLOCK
        .replace_all(text, "")
        .replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", " ")
        .trim()
        .to_string()
}

/// Single-line plain text, used for language sniffing and comparisons
pub fn clean_ass_text(text: &str) -> String {
    let stripped = OVERRIDE_BLOCK
        .replace_all(text, "")
        .replace("\\N", " ")
        .replace("\\n", " ")
        .replace("\\h", " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

#[derive(PartialEq)]
enum Section {
    Info,
    Styles,
    Events,
    Other,
}

fn split_format(line: &str) -> Vec<String> {
    line.split(',').map(|f| f.trim().to_string()).collect()
}

pub fn parse_ass(content: &str) -> Result<SubtitleDocument> {
    let content = content.trim_start_matches('\u{feff}');
    let mut doc = SubtitleDocument::new(SubtitleFormat::Ass, Vec::new());
    let mut section = Section::Other;
    let mut style_format: Vec<String> = split_format(STYLE_FORMAT);
    let mut event_format: Vec<String> = split_format(EVENT_FORMAT);
    let mut saw_section = false;

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            saw_section = true;
            section = match line.to_lowercase().as_str() {
                "[script info]" => Section::Info,
                "[v4+ styles]" => Section::Styles,
                "[v4 styles]" => {
                    doc.format = SubtitleFormat::Ssa;
                    Section::Styles
                }
                "[events]" => Section::Events,
                _ => Section::Other,
            };
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim_start();

        match section {
            Section::Info => {
                if key.eq_ignore_ascii_case("ScriptType") && value.trim().eq_ignore_ascii_case("v4.00") {
                    doc.format = SubtitleFormat::Ssa;
                }
                doc.info.push((key.trim().to_string(), value.trim().to_string()));
            }
            Section::Styles => match key {
                "Format" => style_format = split_format(value),
                "Style" => {
                    let values: Vec<&str> = value.splitn(style_format.len(), ',').collect();
                    doc.styles.push(AssStyle::from_fields(&style_format, &values));
                }
                _ => {}
            },
            Section::Events => match key {
                "Format" => event_format = split_format(value),
                "Dialogue" => {
                    let values: Vec<&str> = value.splitn(event_format.len(), ',').collect();
                    if values.len() < event_format.len() {
                        return Err(KaocheError::Parse(format!("Truncated dialogue line: {}", line)));
                    }
                    let field = |name: &str| {
                        event_format
                            .iter()
                            .position(|f| f.eq_ignore_ascii_case(name))
                            .map(|i| values[i])
                    };

                    let start = field("Start").and_then(parse_timestamp);
                    let end = field("End").and_then(parse_timestamp);
                    let (Some(start_ms), Some(end_ms)) = (start, end) else {
                        return Err(KaocheError::Parse(format!("Invalid dialogue timing: {}", line)));
                    };

                    let text = field("Text").unwrap_or_default();
                    let mut cue = Cue::new(start_ms, end_ms, ass_to_plain(text));
                    cue.style = field("Style").map(|s| s.trim().to_string());
                    doc.cues.push(cue);
                }
                other => debug!("Skipping event line type {}", other),
            },
            Section::Other => {}
        }
    }

    if !saw_section {
        return Err(KaocheError::Parse("No ASS/SSA sections found".to_string()));
    }

    Ok(doc)
}

/// Serialize as ASS (V4+) or SSA (V4)
pub fn to_ass(doc: &SubtitleDocument, format: SubtitleFormat) -> String {
    let ssa = format == SubtitleFormat::Ssa;
    let mut out = String::from("[Script Info]\n");

    let mut has_script_type = false;
    for (key, value) in &doc.info {
        if key.eq_ignore_ascii_case("ScriptType") {
            has_script_type = true;
            out.push_str(&format!("ScriptType: {}\n", if ssa { "v4.00" } else { "v4.00+" }));
        } else {
            out.push_str(&format!("{}: {}\n", key, value));
        }
    }
    if !has_script_type {
        out.push_str(&format!("ScriptType: {}\n", if ssa { "v4.00" } else { "v4.00+" }));
    }

    out.push_str(if ssa { "\n[V4 Styles]\n" } else { "\n[V4+ Styles]\n" });
    out.push_str(&format!("Format: {}\n", STYLE_FORMAT));
    if doc.styles.is_empty() {
        out.push_str(&AssStyle::default().to_ass_line());
        out.push('\n');
    }
    for style in &doc.styles {
        out.push_str(&style.to_ass_line());
        out.push('\n');
    }

    out.push_str("\n[Events]\n");
    out.push_str(&format!("Format: {}\n", EVENT_FORMAT));
    for cue in &doc.cues {
        out.push_str(&format!(
            "Dialogue: 0,{},{},{},,0,0,0,,{}\n",
            format_ass_time(cue.start_ms),
            format_ass_time(cue.end_ms),
            cue.style.as_deref().unwrap_or("Default"),
            cue.text.trim().replace('\n', "\\N")
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[Script Info]\nTitle: Demo\nScriptType: v4.00+\n\n[V4+ Styles]\nFormat: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\nStyle: Default,Arial,40,&H00FFFF00,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,2,1,2,10,10,10,1\n\n[Events]\nFormat: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\nDialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,{\\i1}Hello\\Nworld, friend\nComment: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,ignored\n";

    #[test]
    fn test_parse_ass() {
        let doc = parse_ass(SAMPLE).unwrap();
        assert_eq!(doc.format, SubtitleFormat::Ass);
        assert_eq!(doc.styles.len(), 1);
        assert_eq!(doc.styles[0].fontsize, 40.0);
        assert_eq!(doc.cues.len(), 1);
        assert_eq!(doc.cues[0].start_ms, 1_000);
        assert_eq!(doc.cues[0].end_ms, 2_500);
        assert_eq!(doc.cues[0].text, "Hello\nworld, friend");
        assert_eq!(doc.cues[0].style.as_deref(), Some("Default"));
    }

    #[test]
    fn test_clean_ass_text() {
        assert_eq!(clean_ass_text("{\\b1}Hi\\Nthere\\h  you"), "Hi there you");
    }

    #[test]
    fn test_write_ass_uses_hard_breaks() {
        let doc = SubtitleDocument::new(SubtitleFormat::Ass, vec![Cue::new(0, 1_000, "a\nb")]);
        let out = to_ass(&doc, SubtitleFormat::Ass);
        assert!(out.contains("[V4+ Styles]"));
        assert!(out.contains("Dialogue: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,a\\Nb"));

        let reparsed = parse_ass(&out).unwrap();
        assert_eq!(reparsed.cues[0].text, "a\nb");
    }

    #[test]
    fn test_ssa_detected() {
        let out = to_ass(&SubtitleDocument::new(SubtitleFormat::Ssa, vec![]), SubtitleFormat::Ssa);
        assert!(out.contains("[V4 Styles]"));
        assert_eq!(parse_ass(&out).unwrap().format, SubtitleFormat::Ssa);
    }
}
