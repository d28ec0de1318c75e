use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{KaocheError, Result};

/// Default file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kaoche.toml";

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_batch_size() -> usize {
    10
}

fn default_lqa_temperature() -> f32 {
    1.0
}

fn default_lqa_prompt() -> String {
    "lqa_strict.txt".to_string()
}

fn default_source_language() -> String {
    "English".to_string()
}

fn default_target_language() -> String {
    "Chinese".to_string()
}

fn default_anchor_mode() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub lqa: LqaConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Provider id, matched against `providers[].id`
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Shared key, plain or `enc:`-prefixed
    #[serde(default)]
    pub api_key: String,
    /// Per-provider keys, take precedence over `api_key`
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    Openai,
    Anthropic,
    Gemini,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Openai => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ApiType {
    type Err = KaocheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            _ => Err(KaocheError::Config(format!(
                "Invalid api type '{}'. Valid types: openai, anthropic, gemini",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub api_type: ApiType,
    /// Base URL; empty means the protocol default
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LqaConfig {
    /// Number of pairs sent per LLM request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_lqa_temperature")]
    pub temperature: f32,
    /// Template file name under the prompts directory
    #[serde(default = "default_lqa_prompt")]
    pub prompt: String,
    #[serde(default = "default_source_language")]
    pub source_language: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    #[serde(default)]
    pub global_context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// source, target or auto
    #[serde(default = "default_anchor_mode")]
    pub default_mode: String,
    /// Ask the LLM to fill rows left half-empty by timeline alignment
    #[serde(default = "default_true")]
    pub auto_fill: bool,
    #[serde(default = "default_max_retries")]
    pub fill_max_retries: u32,
    #[serde(default = "default_batch_size")]
    pub fill_batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory overriding the built-in prompt templates
    #[serde(default)]
    pub prompts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Encrypted marker used to verify the password
    #[serde(default)]
    pub check: Option<String>,
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "openai".to_string(),
            api_type: ApiType::Openai,
            api_base: "https://api.openai.com/v1".to_string(),
            models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
        },
        ProviderConfig {
            id: "anthropic".to_string(),
            api_type: ApiType::Anthropic,
            api_base: "https://api.anthropic.com".to_string(),
            models: vec![
                "claude-3-5-sonnet-latest".to_string(),
                "claude-3-5-haiku-latest".to_string(),
            ],
        },
        ProviderConfig {
            id: "gemini".to_string(),
            api_type: ApiType::Gemini,
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            models: vec!["gemini-2.0-flash".to_string(), "gemini-1.5-pro".to_string()],
        },
        ProviderConfig {
            id: "deepseek".to_string(),
            api_type: ApiType::Openai,
            api_base: "https://api.deepseek.com/v1".to_string(),
            models: vec!["deepseek-chat".to_string()],
        },
    ]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            keys: BTreeMap::new(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LqaConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            temperature: default_lqa_temperature(),
            prompt: default_lqa_prompt(),
            source_language: default_source_language(),
            target_language: default_target_language(),
            global_context: String::new(),
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            default_mode: default_anchor_mode(),
            auto_fill: true,
            fill_max_retries: default_max_retries(),
            fill_batch_size: default_batch_size(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prompts_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            providers: default_providers(),
            lqa: LqaConfig::default(),
            alignment: AlignmentConfig::default(),
            advanced: AdvancedConfig::default(),
            encryption: EncryptionConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KaocheError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| KaocheError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KaocheError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| KaocheError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Load the explicit path, else `kaoche.toml` in the working directory, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Look up a provider by id
    pub fn provider(&self, id: &str) -> Result<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| KaocheError::Config(format!("Unknown provider '{}'", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            provider = "anthropic"

            [lqa]
            batch_size = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.api.provider, "anthropic");
        assert_eq!(config.api.model, "gpt-4o-mini");
        assert_eq!(config.lqa.batch_size, 4);
        assert_eq!(config.lqa.temperature, 1.0);
        assert!(config.alignment.auto_fill);
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kaoche.toml");

        let mut config = Config::default();
        config.api.keys.insert("gemini".to_string(), "abc".to_string());
        config.advanced.log_level = "DEBUG".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.api.keys.get("gemini").map(String::as_str), Some("abc"));
        assert_eq!(loaded.advanced.log_level, "DEBUG");
    }

    #[test]
    fn test_provider_lookup() {
        let config = Config::default();
        assert_eq!(config.provider("gemini").unwrap().api_type, ApiType::Gemini);
        assert!(config.provider("nope").is_err());
    }

    #[test]
    fn test_api_type_from_str() {
        assert_eq!("Claude".parse::<ApiType>().unwrap(), ApiType::Anthropic);
        assert!("bogus".parse::<ApiType>().is_err());
    }
}
