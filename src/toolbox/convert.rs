use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::error::{KaocheError, Result};
use crate::subtitle::time::format_vtt_time;
use crate::subtitle::{SubtitleDocument, SubtitleFormat, detect_file_type, extension_of, load_subtitle, save_subtitle};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Default)]
pub struct ConvertSummary {
    pub converted: usize,
    pub failed: Vec<(PathBuf, String)>,
}

fn write_csv(doc: &SubtitleDocument, output: &Path) -> Result<()> {
    let mut file = std::fs::File::create(output)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["Index", "Start", "End", "Text", "Duration (ms)"])?;
    for (i, cue) in doc.cues.iter().enumerate() {
        writer.write_record([
            (i + 1).to_string(),
            format_vtt_time(cue.start_ms),
            format_vtt_time(cue.end_ms),
            cue.text.clone(),
            cue.duration_ms().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Convert one subtitle file; the output format follows the output extension
///
/// ASS styles survive ASS/SSA round trips. `.csv` writes a cue table.
pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<usize> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let out_ext = extension_of(output);
    if out_ext != "csv" && detect_file_type(output) == SubtitleFormat::Unknown {
        return Err(KaocheError::UnsupportedFormat(format!(
            "Cannot convert to .{}; use srt, ass, ssa, vtt, txt or csv",
            out_ext
        )));
    }

    let doc = load_subtitle(input)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if out_ext == "csv" {
        write_csv(&doc, output)?;
    } else {
        save_subtitle(&doc, output)?;
    }

    info!("Converted {} -> {}", input.display(), output.display());
    Ok(doc.cues.len())
}

/// Convert every subtitle under `input_dir` to `ext`, mirroring the tree into `output_dir`
///
/// Individual failures are collected rather than aborting the run.
pub fn convert_dir<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output_dir: Q, ext: &str) -> Result<ConvertSummary> {
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    if !input_dir.is_dir() {
        return Err(KaocheError::FileNotFound(input_dir.display().to_string()));
    }
    let ext = ext.trim_start_matches('.').to_lowercase();

    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && detect_file_type(entry.path()).is_timed() {
            files.push(entry.path().to_path_buf());
        }
    }
    info!("Found {} subtitle files to convert", files.len());

    let mut summary = ConvertSummary::default();
    for file in files {
        let relative = file.strip_prefix(input_dir).unwrap_or(&file);
        let target = output_dir.join(relative).with_extension(&ext);
        if target == file {
            warn!("Skipping {}: output would overwrite input", file.display());
            continue;
        }
        match convert_file(&file, &target) {
            Ok(_) => summary.converted += 1,
            Err(e) => {
                error!("Failed to convert {}: {}", file.display(), e);
                summary.failed.push((file, e.to_string()));
            }
        }
    }

    info!("Converted {} files, {} failed", summary.converted, summary.failed.len());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n\n";

    #[test]
    fn test_convert_to_vtt_and_csv() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.srt");
        std::fs::write(&input, SRT).unwrap();

        let vtt = dir.path().join("out.vtt");
        assert_eq!(convert_file(&input, &vtt).unwrap(), 2);
        assert!(std::fs::read_to_string(&vtt).unwrap().contains("00:00:01.000 --> 00:00:02.500"));

        let csv_path = dir.path().join("out.csv");
        convert_file(&input, &csv_path).unwrap();
        let bytes = std::fs::read(&csv_path).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Index,Start,End,Text,Duration (ms)");
        assert_eq!(lines[1], "1,00:00:01.000,00:00:02.500,Hello,1500");
    }

    #[test]
    fn test_convert_rejects_unknown_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.srt");
        std::fs::write(&input, SRT).unwrap();
        assert!(matches!(
            convert_file(&input, dir.path().join("out.xlsx")),
            Err(KaocheError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_convert_dir_mirrors_tree() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("season1")).unwrap();
        std::fs::write(src.path().join("a.srt"), SRT).unwrap();
        std::fs::write(src.path().join("season1/b.srt"), SRT).unwrap();
        std::fs::write(src.path().join("notes.md"), "ignored").unwrap();

        let summary = convert_dir(src.path(), out.path(), ".ass").unwrap();
        assert_eq!(summary.converted, 2);
        assert!(summary.failed.is_empty());
        assert!(out.path().join("season1/b.ass").exists());
        assert!(std::fs::read_to_string(out.path().join("a.ass")).unwrap().contains("[Events]"));
    }
}
