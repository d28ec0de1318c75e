//! Last-used directories and recent files, persisted between runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{KaocheError, Result};

const HISTORY_FILE: &str = "history.json";
const MAX_RECENT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryData {
    #[serde(default)]
    last_dirs: BTreeMap<String, PathBuf>,
    #[serde(default)]
    recent_files: BTreeMap<String, Vec<PathBuf>>,
}

/// History keyed by purpose (`subtitle`, `video`, `project`, ...)
#[derive(Debug)]
pub struct HistoryManager {
    path: PathBuf,
    data: HistoryData,
}

impl HistoryManager {
    /// History file in the user's config directory
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| KaocheError::Config("Cannot determine user config directory".to_string()))?
            .join("kaoche");
        Ok(Self::with_path(dir.join(HISTORY_FILE)))
    }

    /// History stored at an explicit path; unreadable files start empty
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring corrupt history file {}: {}", path.display(), e);
                HistoryData::default()
            }),
            Err(_) => HistoryData::default(),
        };
        Self { path, data }
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.data)?)?;
        debug!("Saved history to {}", self.path.display());
        Ok(())
    }

    /// Last directory for `key`, if it still exists
    pub fn last_dir(&self, key: &str) -> Option<PathBuf> {
        self.data.last_dirs.get(key).filter(|p| p.is_dir()).cloned()
    }

    /// Remember a directory; a file path records its parent
    pub fn set_last_dir<P: AsRef<Path>>(&mut self, key: &str, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = if path.is_file() { path.parent().unwrap_or(path) } else { path };
        if !dir.is_dir() {
            debug!("Not recording missing directory {}", dir.display());
            return Ok(());
        }
        self.data.last_dirs.insert(key.to_string(), dir.to_path_buf());
        self.save()
    }

    pub fn recent_files(&self, key: &str) -> Vec<PathBuf> {
        self.data.recent_files.get(key).cloned().unwrap_or_default()
    }

    /// Move `path` to the front of the recent list for `key`
    pub fn add_recent_file<P: AsRef<Path>>(&mut self, key: &str, path: P) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let files = self.data.recent_files.entry(key.to_string()).or_default();
        files.retain(|p| p != &path);
        files.insert(0, path);
        files.truncate(MAX_RECENT);
        self.save()
    }
}
