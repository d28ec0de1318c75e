//! Project model and `.kcp` project files.
//!
//! A project is the aligned table of source/target rows plus the files it
//! was built from. Times are stored in seconds, matching the file format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::align::AnchorMode;
use crate::bilingual::BilingualPair;
use crate::error::{KaocheError, Result};
use crate::lqa::LqaResult;
use crate::subtitle::Cue;

pub const PROJECT_VERSION: &str = "1.0";
pub const PROJECT_EXTENSION: &str = "kcp";

/// One side of a row: text with its timing in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
}

impl SideEntry {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn from_cue(cue: &Cue) -> Self {
        Self::new(cue.text.clone(), cue.start_secs(), cue.end_secs())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleRow {
    #[serde(default)]
    pub source: SideEntry,
    #[serde(default)]
    pub target: SideEntry,
    #[serde(default)]
    pub lqa_result: Option<LqaResult>,
}

impl SubtitleRow {
    pub fn new(source: SideEntry, target: SideEntry) -> Self {
        Self {
            source,
            target,
            lqa_result: None,
        }
    }

    pub fn side(&self, side: Side) -> &SideEntry {
        match side {
            Side::Source => &self.source,
            Side::Target => &self.target,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideEntry {
        match side {
            Side::Source => &mut self.source,
            Side::Target => &mut self.target,
        }
    }
}

fn new_project_id() -> Uuid {
    Uuid::new_v4()
}

fn default_version() -> String {
    PROJECT_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "new_project_id")]
    pub id: Uuid,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_file: Option<PathBuf>,
    #[serde(default)]
    pub target_file: Option<PathBuf>,
    #[serde(default)]
    pub video_file: Option<PathBuf>,
    #[serde(default)]
    pub anchor_mode: AnchorMode,
    #[serde(default)]
    pub global_context: String,
    #[serde(default, rename = "subtitle_data")]
    pub rows: Vec<SubtitleRow>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            version: default_version(),
            id: new_project_id(),
            saved_at: None,
            source_file: None,
            target_file: None,
            video_file: None,
            anchor_mode: AnchorMode::default(),
            global_context: String::new(),
            rows: Vec::new(),
        }
    }
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    /// Untimed rows from bilingual pairs
    pub fn from_bilingual_pairs(pairs: &[BilingualPair]) -> Self {
        Self {
            rows: pairs
                .iter()
                .map(|p| SubtitleRow::new(SideEntry::new(p.source.clone(), 0.0, 0.0), SideEntry::new(p.target.clone(), 0.0, 0.0)))
                .collect(),
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SubtitleRow> {
        self.rows.get(index)
    }

    pub fn delete_row(&mut self, index: usize) -> bool {
        if index < self.rows.len() {
            self.rows.remove(index);
            true
        } else {
            false
        }
    }

    /// Insert an empty row; `index == len` appends
    pub fn insert_row(&mut self, index: usize) -> bool {
        if index <= self.rows.len() {
            self.rows.insert(index, SubtitleRow::default());
            true
        } else {
            false
        }
    }

    /// Merge a row with its neighbour and return the index of the surviving row
    ///
    /// Texts are joined top-then-bottom with a newline on both sides and the
    /// timing grows to cover both rows. The surviving row loses its LQA result.
    pub fn merge_rows(&mut self, index: usize, direction: MergeDirection) -> Option<usize> {
        let (keep, remove) = match direction {
            MergeDirection::Up if index > 0 && index < self.rows.len() => (index - 1, index),
            MergeDirection::Down if index + 1 < self.rows.len() => (index, index + 1),
            _ => return None,
        };

        let bottom = self.rows.remove(remove);
        let top = &mut self.rows[keep];
        for side in [Side::Source, Side::Target] {
            let lower = bottom.side(side);
            let upper = top.side_mut(side);
            upper.text = format!("{}\n{}", upper.text, lower.text);
            if !lower.is_empty() || lower.end > 0.0 {
                upper.start = if upper.end > 0.0 { upper.start.min(lower.start) } else { lower.start };
                upper.end = upper.end.max(lower.end);
            }
        }
        top.lqa_result = None;
        Some(keep)
    }

    pub fn update_text(&mut self, index: usize, side: Side, text: impl Into<String>) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.side_mut(side).text = text.into();
                true
            }
            None => false,
        }
    }

    /// (source, target) text for every row
    pub fn lqa_pairs(&self) -> Vec<(String, String)> {
        self.rows
            .iter()
            .map(|r| (r.source.text.clone(), r.target.text.clone()))
            .collect()
    }

    /// Store results by row id
    pub fn apply_lqa_results<I: IntoIterator<Item = LqaResult>>(&mut self, results: I) -> usize {
        let mut applied = 0;
        for result in results {
            match self.rows.get_mut(result.id) {
                Some(row) => {
                    row.lqa_result = Some(result);
                    applied += 1;
                }
                None => warn!("Dropping LQA result for missing row {}", result.id),
            }
        }
        applied
    }

    /// `path` may be relative to the working directory; the result is relative to `base`
    fn relative_to(base: &Path, path: &Option<PathBuf>) -> Result<Option<PathBuf>> {
        match path {
            Some(p) if !p.as_os_str().is_empty() => {
                let absolute = Self::normalize(&std::path::absolute(p)?);
                let base = Self::normalize(base);
                Ok(Some(pathdiff::diff_paths(&absolute, &base).unwrap_or(absolute)))
            }
            _ => Ok(None),
        }
    }

    /// Fold `.` and `..` without touching the filesystem
    fn normalize(path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !out.pop() {
                        out.push(component);
                    }
                }
                other => out.push(other),
            }
        }
        out
    }

    fn resolve_against(base: &Path, path: Option<PathBuf>) -> Option<PathBuf> {
        path.filter(|p| !p.as_os_str().is_empty())
            .map(|p| if p.is_absolute() { p } else { base.join(p) })
    }

    /// Write the project as `.kcp` JSON; file references become relative to it
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = std::path::absolute(&dir)?;

        let mut stored = self.clone();
        stored.version = PROJECT_VERSION.to_string();
        stored.saved_at = Some(Utc::now());
        stored.source_file = Self::relative_to(&base, &self.source_file)?;
        stored.target_file = Self::relative_to(&base, &self.target_file)?;
        stored.video_file = Self::relative_to(&base, &self.video_file)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string_pretty(&stored)?.as_bytes())?;
        tmp.persist(path).map_err(|e| KaocheError::Io(e.error))?;

        self.saved_at = stored.saved_at;
        info!("Saved project with {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KaocheError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut project: Project = serde_json::from_str(&content)
            .map_err(|e| KaocheError::Project(format!("Invalid project file {}: {}", path.display(), e)))?;

        let major = project.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(KaocheError::Project(format!(
                "Unsupported project version '{}'",
                project.version
            )));
        }

        let base = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::path::absolute(dir)?,
            _ => std::env::current_dir()?,
        };
        project.source_file = Self::resolve_against(&base, project.source_file.take());
        project.target_file = Self::resolve_against(&base, project.target_file.take());
        project.video_file = Self::resolve_against(&base, project.video_file.take());

        info!("Loaded project with {} rows from {}", project.rows.len(), path.display());
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    fn sample() -> Project {
        let mut project = Project::new();
        project.rows = vec![
            SubtitleRow::new(SideEntry::new("Hello", 1.0, 2.0), SideEntry::new("你好", 1.0, 2.0)),
            SubtitleRow::new(SideEntry::new("world", 2.0, 3.5), SideEntry::new("世界", 2.1, 3.4)),
            SubtitleRow::new(SideEntry::new("Bye", 4.0, 5.0), SideEntry::new("再见", 4.0, 5.0)),
        ];
        project
    }

    #[test]
    fn test_insert_and_delete() {
        let mut project = sample();
        assert!(project.insert_row(3));
        assert_eq!(project.len(), 4);
        assert!(project.get(3).unwrap().source.is_empty());
        assert!(!project.insert_row(9));
        assert!(project.delete_row(0));
        assert!(!project.delete_row(10));
        assert_eq!(project.get(0).unwrap().source.text, "world");
    }

    #[test]
    fn test_merge_up_and_down() {
        let mut project = sample();
        assert_eq!(project.merge_rows(1, MergeDirection::Up), Some(0));
        let merged = project.get(0).unwrap();
        assert_eq!(merged.source.text, "Hello\nworld");
        assert_eq!(merged.target.text, "你好\n世界");
        assert_eq!(merged.source.end, 3.5);
        assert_eq!(project.len(), 2);

        assert_eq!(project.merge_rows(0, MergeDirection::Down), Some(0));
        assert_eq!(project.get(0).unwrap().source.text, "Hello\nworld\nBye");
        assert_eq!(project.len(), 1);

        assert_eq!(project.merge_rows(0, MergeDirection::Up), None);
        assert_eq!(project.merge_rows(0, MergeDirection::Down), None);
    }

    #[test]
    fn test_update_text_and_pairs() {
        let mut project = sample();
        assert!(project.update_text(2, Side::Target, "拜拜"));
        assert!(!project.update_text(5, Side::Target, "x"));
        assert_eq!(project.lqa_pairs()[2], ("Bye".to_string(), "拜拜".to_string()));
    }

    #[test]
    fn test_save_and_load_relative_paths() {
        let dir = TempDir::new().unwrap();
        let base = std::path::absolute(dir.path()).unwrap();
        let mut project = sample();
        project.source_file = Some(base.join("subs").join("en.srt"));
        project.global_context = "A cooking show".to_string();
        project.anchor_mode = AnchorMode::Target;

        let path = dir.path().join("demo.kcp");
        project.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], "1.0");
        assert_eq!(raw["anchor_mode"], "target");
        assert_eq!(raw["source_file"], "subs/en.srt");
        assert_eq!(raw["subtitle_data"][0]["source"]["text"], "Hello");

        let loaded = Project::load(&path).unwrap();
        assert_eq!(loaded.rows, project.rows);
        assert_eq!(loaded.source_file, Some(base.join("subs/en.srt")));
        assert_eq!(loaded.global_context, "A cooking show");
        assert_eq!(loaded.id, project.id);
    }

    #[test]
    fn test_working_dir_relative_paths_survive_save_in_subdir() {
        let dir = TempDir::new().unwrap();
        let base = std::path::absolute(dir.path()).unwrap();
        let subtitle = base.join("en.srt");
        std::fs::write(&subtitle, "1\n00:00:01,000 --> 00:00:02,000\nHello\n").unwrap();

        let cwd = std::env::current_dir().unwrap();
        let from_cwd = pathdiff::diff_paths(&subtitle, &cwd).unwrap();
        assert!(from_cwd.is_relative());

        let mut project = sample();
        project.source_file = Some(from_cwd);
        let out = base.join("out");
        std::fs::create_dir_all(&out).unwrap();
        let path = out.join("demo.kcp");
        project.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["source_file"], "../en.srt");

        let loaded = Project::load(&path).unwrap();
        let resolved = loaded.source_file.unwrap();
        assert!(resolved.exists(), "{} should exist", resolved.display());
    }

    #[test]
    fn test_load_lqa_result_without_score() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.kcp");
        std::fs::write(
            &path,
            r#"{"version": "1.0", "subtitle_data": [{"source": {"text": "Hi", "start": 0, "end": 1}, "target": {"text": "嗨", "start": 0, "end": 1}, "lqa_result": {"issues": ["a"], "suggestions": "y"}}]}"#,
        )
        .unwrap();

        let project = Project::load(&path).unwrap();
        let lqa = project.rows[0].lqa_result.as_ref().unwrap();
        assert_eq!(lqa.score, 0.0);
        assert_eq!(lqa.issues, vec!["a".to_string()]);
        assert_eq!(lqa.suggestion, "y");
    }

    #[test]
    fn test_load_minimal_legacy_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.kcp");
        std::fs::write(
            &path,
            r#"{"version": "1.0", "source_file": null, "subtitle_data": [{"source": {"text": "Hi", "start": 0, "end": 1}, "target": {"text": "嗨"}, "lqa_result": null}]}"#,
        )
        .unwrap();

        let project = Project::load(&path).unwrap();
        assert_eq!(project.anchor_mode, AnchorMode::Source);
        assert_eq!(project.rows[0].target.text, "嗨");
        assert_eq!(project.rows[0].target.end, 0.0);
    }

    #[test]
    fn test_rejects_future_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.kcp");
        std::fs::write(&path, r#"{"version": "2.0", "subtitle_data": []}"#).unwrap();
        assert!(matches!(Project::load(&path), Err(KaocheError::Project(_))));
    }
}
