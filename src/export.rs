//! Report and subtitle exports for project rows.

use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::error::{KaocheError, Result};
use crate::project::{Side, SubtitleRow};
use crate::subtitle::time::secs_to_ms;
use crate::subtitle::{Cue, SubtitleFormat, extension_of, save_cues};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Which side's timing an exported cue carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeBase {
    #[default]
    Source,
    Target,
}

impl From<TimeBase> for Side {
    fn from(base: TimeBase) -> Self {
        match base {
            TimeBase::Source => Side::Source,
            TimeBase::Target => Side::Target,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportItem<'a> {
    id: usize,
    start: f64,
    end: f64,
    source: &'a str,
    target: &'a str,
    score: f64,
    issues: &'a [String],
    suggestions: &'a str,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    generated_at: String,
    items: Vec<ReportItem<'a>>,
}

#[derive(Debug, Serialize)]
struct ExportedLine<'a> {
    id: usize,
    start: f64,
    end: f64,
    text: &'a str,
}

/// `HH:MM:SS.mmm`, empty for zero
fn report_time(seconds: f64) -> String {
    let ms = secs_to_ms(seconds);
    if ms <= 0 {
        return String::new();
    }
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        ms % 3_600_000 / 60_000,
        ms % 60_000 / 1000,
        ms % 1000
    )
}

pub fn export_lqa_report_json<P: AsRef<Path>>(rows: &[SubtitleRow], path: P) -> Result<()> {
    let items = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let lqa = row.lqa_result.as_ref();
            ReportItem {
                id: i + 1,
                start: row.source.start,
                end: row.source.end,
                source: &row.source.text,
                target: &row.target.text,
                score: lqa.map(|r| r.score).unwrap_or(0.0),
                issues: lqa.map(|r| r.issues.as_slice()).unwrap_or(&[]),
                suggestions: lqa.map(|r| r.suggestion.as_str()).unwrap_or(""),
            }
        })
        .collect();
    let report = Report {
        generated_at: Utc::now().to_rfc3339(),
        items,
    };

    std::fs::write(path.as_ref(), serde_json::to_string_pretty(&report)?)?;
    info!("Exported JSON report to {}", path.as_ref().display());
    Ok(())
}

pub fn export_lqa_report_csv<P: AsRef<Path>>(rows: &[SubtitleRow], path: P) -> Result<()> {
    let mut file = std::fs::File::create(path.as_ref())?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["ID", "Start", "End", "Source", "Target", "Score", "Issues", "Suggestion"])?;
    for (i, row) in rows.iter().enumerate() {
        let lqa = row.lqa_result.as_ref();
        writer.write_record([
            (i + 1).to_string(),
            report_time(row.source.start),
            report_time(row.source.end),
            row.source.text.clone(),
            row.target.text.clone(),
            lqa.map(|r| r.score.to_string()).unwrap_or_default(),
            lqa.map(|r| r.issues.join("; ")).unwrap_or_default(),
            lqa.map(|r| r.suggestion.clone()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    info!("Exported CSV report to {}", path.as_ref().display());
    Ok(())
}

fn write_lines(lines: Vec<(f64, f64, &str)>, path: &Path) -> Result<usize> {
    let count = lines.len();
    if extension_of(path) == "json" {
        let items: Vec<ExportedLine> = lines
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, text))| ExportedLine { id: i + 1, start, end, text })
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&items)?)?;
        return Ok(count);
    }

    if SubtitleFormat::from_extension(&extension_of(path)) == SubtitleFormat::Unknown {
        return Err(KaocheError::UnsupportedFormat(format!(
            "Cannot export to {}; use srt, ass, ssa, vtt, txt or json",
            path.display()
        )));
    }
    let cues: Vec<Cue> = lines
        .into_iter()
        .map(|(start, end, text)| Cue::new(secs_to_ms(start), secs_to_ms(end), text))
        .collect();
    save_cues(&cues, path)?;
    Ok(count)
}

/// Write LQA suggestions, keeping the target text where there is none
pub fn export_suggestions<P: AsRef<Path>>(rows: &[SubtitleRow], path: P, time_base: TimeBase) -> Result<usize> {
    let side = Side::from(time_base);
    let lines = rows
        .iter()
        .map(|row| {
            let timing = row.side(side);
            let text = match &row.lqa_result {
                Some(result) if result.has_suggestion() => result.suggestion.as_str(),
                _ => row.target.text.as_str(),
            };
            (timing.start, timing.end, text)
        })
        .collect();
    let count = write_lines(lines, path.as_ref())?;
    info!("Exported {} suggestions to {}", count, path.as_ref().display());
    Ok(count)
}

/// Write one side of the rows as a subtitle, text or JSON file
pub fn export_content<P: AsRef<Path>>(rows: &[SubtitleRow], path: P, side: Side, time_base: TimeBase) -> Result<usize> {
    let timing_side = Side::from(time_base);
    let lines = rows
        .iter()
        .map(|row| {
            let timing = row.side(timing_side);
            (timing.start, timing.end, row.side(side).text.as_str())
        })
        .collect();
    let count = write_lines(lines, path.as_ref())?;
    info!("Exported {} {:?} lines to {}", count, side, path.as_ref().display());
    Ok(count)
}
