// Subtitle codec layer
//
// Every format is read into the same in-memory model:
// - Cue: one timed line, millisecond timing, plain text with '\n' breaks
// - SubtitleDocument: cues plus the ASS script info and styles when present
//
// Readers decode legacy encodings first (see encoding.rs), writers pick the
// format from the destination extension.

pub mod ass;
pub mod encoding;
pub mod srt;
pub mod style;
pub mod time;
pub mod txt;
pub mod vtt;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

pub use ass::clean_ass_text;
pub use encoding::read_text_file;
pub use style::{AssStyle, Color, StyleManager};

use crate::error::{KaocheError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Cue {
    pub fn new(start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            style: None,
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_ms - self.start_ms).max(0)
    }

    pub fn start_secs(&self) -> f64 {
        time::ms_to_secs(self.start_ms)
    }

    pub fn end_secs(&self) -> f64 {
        time::ms_to_secs(self.end_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Ass,
    Ssa,
    Vtt,
    Txt,
    Unknown,
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "srt" => Self::Srt,
            "ass" => Self::Ass,
            "ssa" => Self::Ssa,
            "vtt" => Self::Vtt,
            "txt" | "text" => Self::Txt,
            _ => Self::Unknown,
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, Self::Srt | Self::Ass | Self::Ssa | Self::Vtt)
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::Vtt => "vtt",
            Self::Txt => "txt",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

/// Lower-cased extension without the dot
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

pub fn detect_file_type<P: AsRef<Path>>(path: P) -> SubtitleFormat {
    SubtitleFormat::from_extension(&extension_of(path.as_ref()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleDocument {
    pub format: SubtitleFormat,
    pub cues: Vec<Cue>,
    pub styles: Vec<AssStyle>,
    /// `[Script Info]` entries in file order
    pub info: Vec<(String, String)>,
}

impl SubtitleDocument {
    pub fn new(format: SubtitleFormat, cues: Vec<Cue>) -> Self {
        Self {
            format,
            cues,
            styles: Vec::new(),
            info: Vec::new(),
        }
    }

    pub fn parse(content: &str, format: SubtitleFormat) -> Result<Self> {
        match format {
            SubtitleFormat::Srt => Ok(Self::new(format, srt::parse_srt(content)?)),
            SubtitleFormat::Vtt => Ok(Self::new(format, vtt::parse_vtt(content)?)),
            SubtitleFormat::Ass | SubtitleFormat::Ssa => ass::parse_ass(content),
            SubtitleFormat::Txt => Ok(Self::new(format, txt::parse_plain_text(content))),
            SubtitleFormat::Unknown => Err(KaocheError::UnsupportedFormat(
                "cannot parse subtitle of unknown format".to_string(),
            )),
        }
    }

    pub fn render(&self, format: SubtitleFormat) -> Result<String> {
        match format {
            SubtitleFormat::Srt => Ok(srt::to_srt(&self.cues)),
            SubtitleFormat::Vtt => Ok(vtt::to_vtt(&self.cues)),
            SubtitleFormat::Ass | SubtitleFormat::Ssa => Ok(ass::to_ass(self, format)),
            SubtitleFormat::Txt => Ok(txt::to_txt(&self.cues)),
            SubtitleFormat::Unknown => Err(KaocheError::UnsupportedFormat(
                "cannot write subtitle of unknown format".to_string(),
            )),
        }
    }
}

pub fn load_subtitle<P: AsRef<Path>>(path: P) -> Result<SubtitleDocument> {
    let path = path.as_ref();
    let format = detect_file_type(path);
    if format == SubtitleFormat::Unknown {
        return Err(KaocheError::UnsupportedFormat(path.display().to_string()));
    }
    let content = read_text_file(path)?;
    let doc = SubtitleDocument::parse(&content, format)?;
    info!("Loaded {} cues from {}", doc.cues.len(), path.display());
    Ok(doc)
}

/// Lenient loader: parse failures are logged and yield no cues
pub fn parse_subtitle_file<P: AsRef<Path>>(path: P) -> Vec<Cue> {
    let path = path.as_ref();
    match load_subtitle(path) {
        Ok(doc) => doc.cues,
        Err(e) => {
            warn!("Failed to parse subtitle file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn save_subtitle<P: AsRef<Path>>(doc: &SubtitleDocument, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = detect_file_type(path);
    if format == SubtitleFormat::Unknown {
        return Err(KaocheError::UnsupportedFormat(path.display().to_string()));
    }
    std::fs::write(path, doc.render(format)?)?;
    info!("Wrote {} cues to {}", doc.cues.len(), path.display());
    Ok(())
}

pub fn save_cues<P: AsRef<Path>>(cues: &[Cue], path: P) -> Result<()> {
    let doc = SubtitleDocument::new(detect_file_type(path.as_ref()), cues.to_vec());
    save_subtitle(&doc, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_detect_file_type() {
        assert_eq!(detect_file_type("a/b/movie.SRT"), SubtitleFormat::Srt);
        assert_eq!(detect_file_type("x.text"), SubtitleFormat::Txt);
        assert_eq!(detect_file_type("x.ssa"), SubtitleFormat::Ssa);
        assert_eq!(detect_file_type("x.mp4"), SubtitleFormat::Unknown);
        assert_eq!(detect_file_type("noext"), SubtitleFormat::Unknown);
    }

    #[test]
    fn test_save_and_load_across_formats() {
        let dir = TempDir::new().unwrap();
        let cues = vec![Cue::new(1_000, 2_000, "One"), Cue::new(2_500, 4_000, "Two\nlines")];

        for ext in ["srt", "vtt", "ass"] {
            let path = dir.path().join(format!("out.{}", ext));
            save_cues(&cues, &path).unwrap();
            let loaded = load_subtitle(&path).unwrap();
            assert_eq!(loaded.cues.len(), 2, "format {}", ext);
            assert_eq!(loaded.cues[1].text, "Two\nlines");
            assert_eq!(loaded.cues[1].end_ms, 4_000);
        }
    }

    #[test]
    fn test_parse_subtitle_file_is_lenient() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.ass");
        std::fs::write(&path, "not a subtitle").unwrap();
        assert!(parse_subtitle_file(&path).is_empty());
        assert!(parse_subtitle_file(dir.path().join("missing.srt")).is_empty());
    }
}
