// LLM provider clients
//
// Every provider implements the LlmClient trait and is created through
// LlmClientFactory from a ProviderConfig:
// - openai: OpenAI chat-completions protocol (also DeepSeek and other compatibles)
// - anthropic: Messages API
// - gemini: native generateContent with an OpenAI-compatible fallback
//
// Responses are free-form text; callers extract structured data with
// json::parse_json_from_response.

pub mod anthropic;
pub mod gemini;
pub mod json;
pub mod openai;
pub mod retry;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub use json::parse_json_from_response;
pub use retry::retry_with_backoff;

use crate::config::{ApiType, Config, ProviderConfig};
use crate::error::{KaocheError, Result};
use crate::secrets;

/// One chat-style generation request
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    /// Ask the provider for a JSON body
    pub json_mode: bool,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            json_mode: false,
            temperature: 0.7,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub usage: Usage,
}

/// Main trait for text generation backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the request
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse>;

    /// Model identifier used for requests
    fn model(&self) -> String;
}

/// Transport settings shared by all providers
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

pub(crate) fn build_http_client(settings: &ClientSettings) -> Result<Client> {
    Ok(Client::builder().timeout(settings.timeout).build()?)
}

/// Turn a non-success HTTP response into an `Api` error
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    debug!("Provider returned {}: {}", status, message);
    Err(KaocheError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Factory for creating LLM clients
pub struct LlmClientFactory;

impl LlmClientFactory {
    /// Create a client for the provider's wire protocol
    pub fn create(
        provider: &ProviderConfig,
        api_key: String,
        model: String,
        settings: ClientSettings,
    ) -> Result<Box<dyn LlmClient>> {
        if api_key.trim().is_empty() {
            return Err(KaocheError::Config(format!(
                "No API key configured for provider '{}'",
                provider.id
            )));
        }

        info!("Creating {} client for provider '{}' with model {}", provider.api_type, provider.id, model);
        match provider.api_type {
            ApiType::Openai => Ok(Box::new(openai::OpenAiClient::new(
                &provider.api_base,
                api_key,
                model,
                settings,
            )?)),
            ApiType::Anthropic => Ok(Box::new(anthropic::AnthropicClient::new(
                &provider.api_base,
                api_key,
                model,
                settings,
            )?)),
            ApiType::Gemini => Ok(Box::new(gemini::GeminiClient::new(
                &provider.api_base,
                api_key,
                model,
                settings,
            )?)),
        }
    }

    /// Create the client selected by `[api]`, decrypting the key if needed
    pub fn from_config(config: &Config, password: Option<&str>) -> Result<Box<dyn LlmClient>> {
        let provider = config.provider(&config.api.provider)?;
        let api_key = secrets::get_api_key(config, password, Some(&provider.id))?;
        let settings = ClientSettings {
            timeout: Duration::from_secs(config.api.timeout_secs),
            max_retries: config.api.max_retries,
            ..ClientSettings::default()
        };
        Self::create(provider, api_key, config.api.model.clone(), settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("sys", "user").json().temperature(0.3);
        assert!(request.json_mode);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.system, "sys");
    }

    #[test]
    fn test_factory_requires_key() {
        let config = Config::default();
        let provider = config.provider("openai").unwrap();
        let result = LlmClientFactory::create(provider, "  ".into(), "m".into(), ClientSettings::default());
        assert!(matches!(result, Err(KaocheError::Config(_))));
    }

    #[test]
    fn test_factory_from_config() {
        let mut config = Config::default();
        config.api.provider = "anthropic".to_string();
        config.api.model = "claude-3-5-haiku-latest".to_string();
        config.api.keys.insert("anthropic".to_string(), "sk-ant".to_string());

        let client = LlmClientFactory::from_config(&config, None).unwrap();
        assert_eq!(client.model(), "claude-3-5-haiku-latest");
    }
}
