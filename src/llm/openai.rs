use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClientSettings, LlmClient, LlmRequest, LlmResponse, Usage, build_http_client, check_status, retry_with_backoff};
use crate::error::{KaocheError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

fn build_body<'a>(model: &'a str, request: &'a LlmRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.is_empty() {
        messages.push(ChatMessage { role: "system", content: &request.system });
    }
    messages.push(ChatMessage { role: "user", content: &request.user });

    ChatRequest {
        model,
        messages,
        temperature: request.temperature,
        response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
    }
}

/// One chat-completions call against any OpenAI-compatible endpoint
pub(crate) async fn chat_completion(
    client: &Client,
    api_base: &str,
    api_key: &str,
    model: &str,
    request: &LlmRequest,
) -> Result<LlmResponse> {
    let url = format!("{}/chat/completions", api_base.trim_end_matches('/'));
    debug!("Sending chat completion request to: {}", url);

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(&build_body(model, request))
        .send()
        .await?;
    let parsed: ChatResponse = check_status(response).await?.json().await?;

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| KaocheError::Llm("Empty completion returned".to_string()))?;
    let usage = parsed
        .usage
        .map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        text,
        model: parsed.model.unwrap_or_else(|| model.to_string()),
        usage,
    })
}

/// OpenAI and compatible providers
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    settings: ClientSettings,
}

impl OpenAiClient {
    pub fn new(api_base: &str, api_key: String, model: String, settings: ClientSettings) -> Result<Self> {
        let api_base = if api_base.is_empty() { DEFAULT_API_BASE } else { api_base };
        Ok(Self {
            client: build_http_client(&settings)?,
            api_base: api_base.to_string(),
            api_key,
            model,
            settings,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        retry_with_backoff(
            || chat_completion(&self.client, &self.api_base, &self.api_key, &self.model, request),
            self.settings.max_retries,
            self.settings.backoff_base,
        )
        .await
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
