//! Decide what to do with a file handed to the tool.
//!
//! Classification never touches the project; it only looks at the file and
//! at what the caller already has loaded, and suggests an action.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::bilingual::{BilingualFormat, Lang, detect_bilingual_format, detect_language};
use crate::project::{Project, Side};
use crate::subtitle::{extension_of, read_text_file};

const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "avi", "mov", "wmv"];
const SUBTITLE_EXTENSIONS: [&str; 4] = ["srt", "ass", "ssa", "vtt"];
const SAMPLE_SCAN_LINES: usize = 100;
const SAMPLE_LINES: usize = 20;

/// What is already loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectState {
    pub has_video: bool,
    pub has_rows: bool,
    pub has_source: bool,
    pub has_target: bool,
}

impl ProjectState {
    pub fn of(project: &Project) -> Self {
        Self {
            has_video: project.video_file.is_some(),
            has_rows: !project.is_empty(),
            has_source: project.source_file.is_some(),
            has_target: project.target_file.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum InputDecision {
    LoadVideo,
    /// A video is already open
    VideoConflict,
    LoadBilingual { format: BilingualFormat },
    /// Rows or files are already loaded
    BilingualConflict { format: BilingualFormat },
    /// Nothing loaded; ask which side this is
    AskType {
        #[serde(skip_serializing_if = "Option::is_none")]
        suggested: Option<SideHint>,
        detected: Option<Lang>,
    },
    SuggestTarget { detected: Option<Lang> },
    SuggestSource { detected: Option<Lang> },
    /// Both sides or bilingual rows are loaded
    FullConflict { detected: Option<Lang> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SideHint {
    Source,
    Target,
}

impl From<SideHint> for Side {
    fn from(hint: SideHint) -> Self {
        match hint {
            SideHint::Source => Side::Source,
            SideHint::Target => Side::Target,
        }
    }
}

/// Language of the first non-empty lines, `None` if unreadable or blank
fn sample_language(path: &Path) -> Option<Lang> {
    let content = read_text_file(path)
        .map_err(|e| debug!("Cannot sample {}: {}", path.display(), e))
        .ok()?;
    let sample: Vec<&str> = content
        .lines()
        .take(SAMPLE_SCAN_LINES)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(SAMPLE_LINES)
        .collect();
    if sample.is_empty() {
        return None;
    }
    Some(detect_language(&sample.join("\n")))
}

fn monolingual_decision(state: &ProjectState, detected: Option<Lang>) -> InputDecision {
    match (state.has_source, state.has_target, state.has_rows) {
        (false, false, false) => {
            let suggested = match detected {
                Some(Lang::Zh) => Some(SideHint::Target),
                Some(lang) if lang.is_typical_source() => Some(SideHint::Source),
                _ => None,
            };
            InputDecision::AskType { suggested, detected }
        }
        (true, false, _) => InputDecision::SuggestTarget { detected },
        (false, true, _) => InputDecision::SuggestSource { detected },
        _ => InputDecision::FullConflict { detected },
    }
}

/// Suggest how to load `path` given what is already open
pub fn classify_input<P: AsRef<Path>>(path: P, state: &ProjectState) -> InputDecision {
    let path = path.as_ref();
    let ext = extension_of(path);

    let decision = if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        if state.has_video {
            InputDecision::VideoConflict
        } else {
            InputDecision::LoadVideo
        }
    } else {
        let format = if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            BilingualFormat::Unknown
        } else {
            detect_bilingual_format(path)
        };

        if format != BilingualFormat::Unknown {
            if state.has_rows || state.has_source || state.has_target {
                InputDecision::BilingualConflict { format }
            } else {
                InputDecision::LoadBilingual { format }
            }
        } else {
            monolingual_decision(state, sample_language(path))
        }
    };

    info!("Input {} classified as {:?}", path.display(), decision);
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_video() {
        let empty = ProjectState::default();
        assert_eq!(classify_input("clip.MKV", &empty), InputDecision::LoadVideo);
        let busy = ProjectState { has_video: true, ..empty };
        assert_eq!(classify_input("clip.mp4", &busy), InputDecision::VideoConflict);
    }

    #[test]
    fn test_bilingual() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "pairs.txt", "Hello | 你好\nBye | 再见\nYes | 是\nNo | 不\n");

        assert_eq!(
            classify_input(&path, &ProjectState::default()),
            InputDecision::LoadBilingual { format: BilingualFormat::Delimiter }
        );
        let loaded = ProjectState { has_rows: true, ..ProjectState::default() };
        assert_eq!(
            classify_input(&path, &loaded),
            InputDecision::BilingualConflict { format: BilingualFormat::Delimiter }
        );
    }

    #[test]
    fn test_monolingual_suggestions() {
        let dir = TempDir::new().unwrap();
        let english = write(&dir, "en.srt", "1\n00:00:01,000 --> 00:00:02,000\nHello there, my friend\n");
        let chinese = write(&dir, "zh.srt", "1\n00:00:01,000 --> 00:00:02,000\n你好，我的朋友\n");

        let empty = ProjectState::default();
        assert_eq!(
            classify_input(&english, &empty),
            InputDecision::AskType { suggested: Some(SideHint::Source), detected: Some(Lang::En) }
        );
        assert_eq!(
            classify_input(&chinese, &empty),
            InputDecision::AskType { suggested: Some(SideHint::Target), detected: Some(Lang::Zh) }
        );

        let with_source = ProjectState { has_source: true, has_rows: true, ..empty };
        assert_eq!(classify_input(&chinese, &with_source), InputDecision::SuggestTarget { detected: Some(Lang::Zh) });
        let with_target = ProjectState { has_target: true, ..empty };
        assert_eq!(classify_input(&english, &with_target), InputDecision::SuggestSource { detected: Some(Lang::En) });
        let bilingual_rows = ProjectState { has_rows: true, ..empty };
        assert_eq!(classify_input(&english, &bilingual_rows), InputDecision::FullConflict { detected: Some(Lang::En) });
    }

    #[test]
    fn test_unreadable_file_asks_without_hint() {
        assert_eq!(
            classify_input("/nonexistent/notes.srt", &ProjectState::default()),
            InputDecision::AskType { suggested: None, detected: None }
        );
    }
}
