//! Prompt templates for review and alignment requests.
//!
//! Built-in templates are compiled into the binary. A `prompts_dir` in the
//! config can shadow any of them, or add new ones selectable by file name.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::{KaocheError, Result};

pub const LQA_STRICT: &str = "lqa_strict.txt";
pub const LQA_PAIR: &str = "lqa_pair.txt";
pub const GLOBAL_LQA: &str = "global_lqa.txt";
pub const ALIGNMENT: &str = "alignment.txt";
pub const FILL_GAPS: &str = "fill_gaps.txt";

const BUILTIN: &[(&str, &str)] = &[
    (LQA_STRICT, include_str!("../config/prompts/lqa_strict.txt")),
    (LQA_PAIR, include_str!("../config/prompts/lqa_pair.txt")),
    (GLOBAL_LQA, include_str!("../config/prompts/global_lqa.txt")),
    (ALIGNMENT, include_str!("../config/prompts/alignment.txt")),
    (FILL_GAPS, include_str!("../config/prompts/fill_gaps.txt")),
];

/// Values substituted into `{placeholder}` slots
#[derive(Debug, Clone, Default)]
pub struct PromptVars<'a> {
    pub context: &'a str,
    pub source_language: &'a str,
    pub target_language: &'a str,
    pub source: &'a str,
    pub target: &'a str,
}

impl<'a> PromptVars<'a> {
    pub fn languages(context: &'a str, source_language: &'a str, target_language: &'a str) -> Self {
        Self {
            context,
            source_language,
            target_language,
            ..Self::default()
        }
    }

    pub fn pair(mut self, source: &'a str, target: &'a str) -> Self {
        self.source = source;
        self.target = target;
        self
    }
}

/// Replace the known placeholders; unknown braces are left alone so JSON
/// examples inside templates survive
pub fn format_prompt(template: &str, vars: &PromptVars<'_>) -> String {
    template
        .replace("{context}", vars.context)
        .replace("{source_language}", vars.source_language)
        .replace("{target_language}", vars.target_language)
        .replace("{source}", vars.source)
        .replace("{target}", vars.target)
}

#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    dir: Option<PathBuf>,
}

impl PromptStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.advanced.prompts_dir.clone())
    }

    pub fn builtin(name: &str) -> Option<&'static str> {
        BUILTIN.iter().find(|(n, _)| *n == name).map(|(_, text)| *text)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN.iter().map(|(n, _)| n.to_string()).collect();
        if let Some(dir) = &self.dir {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name.ends_with(".txt") && !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        names
    }

    fn override_path(&self, name: &str) -> Option<PathBuf> {
        self.dir
            .as_deref()
            .map(|dir| dir.join(name))
            .filter(|p| p.is_file())
    }

    /// Template text, preferring a file in the prompts directory
    pub fn load(&self, name: &str) -> Result<String> {
        if Path::new(name).components().count() != 1 {
            return Err(KaocheError::InvalidArgument(format!("Invalid prompt name '{}'", name)));
        }
        if let Some(path) = self.override_path(name) {
            debug!("Using prompt override {}", path.display());
            return Ok(std::fs::read_to_string(path)?);
        }
        Self::builtin(name)
            .map(str::to_string)
            .ok_or_else(|| KaocheError::Config(format!("Prompt template '{}' not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_builtin_templates_have_placeholders() {
        let strict = PromptStore::builtin(LQA_STRICT).unwrap();
        assert!(strict.contains("{context}"));
        assert!(strict.contains("{target_language}"));
        let pair = PromptStore::builtin(LQA_PAIR).unwrap();
        assert!(pair.contains("{source}") && pair.contains("{target}"));
        assert!(PromptStore::builtin("missing.txt").is_none());
    }

    #[test]
    fn test_format_prompt_keeps_json_braces() {
        let vars = PromptVars::languages("A heist film", "English", "Chinese").pair("Run!", "快跑！");
        let text = format_prompt("{context}|{source_language}>{target_language}|{source}={target}|{\"score\": 1}", &vars);
        assert_eq!(text, "A heist film|English>Chinese|Run!=快跑！|{\"score\": 1}");
    }

    #[test]
    fn test_override_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LQA_STRICT), "custom {context}").unwrap();
        std::fs::write(dir.path().join("lqa_casual.txt"), "casual").unwrap();

        let store = PromptStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.load(LQA_STRICT).unwrap(), "custom {context}");
        assert_eq!(store.load("lqa_casual.txt").unwrap(), "casual");
        assert!(store.load(ALIGNMENT).unwrap().contains("JSON array"));
        assert!(store.names().contains(&"lqa_casual.txt".to_string()));
        assert!(matches!(store.load("../secret.txt"), Err(KaocheError::InvalidArgument(_))));
        assert!(matches!(store.load("nope.txt"), Err(KaocheError::Config(_))));
    }
}
