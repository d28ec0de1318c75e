use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientSettings, LlmClient, LlmRequest, LlmResponse, Usage, build_http_client, check_status, retry_with_backoff};
use crate::error::{KaocheError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const JSON_SUFFIX: &str = "\n\nPlease respond with valid JSON only, no markdown formatting.";

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

fn is_blank(value: &&str) -> bool {
    value.trim().is_empty()
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "is_blank")]
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    settings: ClientSettings,
}

impl AnthropicClient {
    pub fn new(api_base: &str, api_key: String, model: String, settings: ClientSettings) -> Result<Self> {
        let api_base = if api_base.is_empty() { DEFAULT_API_BASE } else { api_base };
        Ok(Self {
            client: build_http_client(&settings)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            settings,
        })
    }

    fn build_body<'a>(&'a self, request: &'a LlmRequest) -> MessagesRequest<'a> {
        let mut user = request.user.clone();
        if request.json_mode {
            user.push_str(JSON_SUFFIX);
        }

        MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: request.temperature,
            system: &request.system,
            messages: vec![Message { role: "user", content: user }],
        }
    }

    async fn send_once(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/messages", self.api_base);
        debug!("Sending Anthropic request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_body(request))
            .send()
            .await?;
        let parsed: MessagesResponse = check_status(response).await?.json().await?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(KaocheError::Llm("Anthropic returned no text content".to_string()));
        }

        let usage = parsed
            .usage
            .map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        retry_with_backoff(
            || self.send_once(request),
            self.settings.max_retries,
            self.settings.backoff_base,
        )
        .await
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_appends_instruction() {
        let client = AnthropicClient::new("", "k".into(), "claude".into(), ClientSettings::default()).unwrap();
        let request = LlmRequest::new("sys", "Review this").json();
        let body = serde_json::to_value(client.build_body(&request)).unwrap();

        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "sys");
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.starts_with("Review this"));
        assert!(content.ends_with("no markdown formatting."));
    }

    #[test]
    fn test_empty_system_omitted() {
        let client = AnthropicClient::new("https://proxy.local/", "k".into(), "c".into(), ClientSettings::default()).unwrap();
        assert_eq!(client.api_base, "https://proxy.local");
        let body = serde_json::to_value(client.build_body(&LlmRequest::new("", "x"))).unwrap();
        assert!(body.get("system").is_none());
    }
}
