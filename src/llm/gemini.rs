use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::openai::chat_completion;
use super::{ClientSettings, LlmClient, LlmRequest, LlmResponse, Usage, build_http_client, check_status, retry_with_backoff};
use crate::error::{KaocheError, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_COMPAT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// Which Gemini endpoint answered first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiMode {
    Native,
    OpenAiCompatible,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Google Gemini client with automatic endpoint detection
pub struct GeminiClient {
    client: Client,
    api_base: String,
    compat_base: String,
    api_key: String,
    model: String,
    settings: ClientSettings,
    mode: OnceCell<GeminiMode>,
}

impl GeminiClient {
    pub fn new(api_base: &str, api_key: String, model: String, settings: ClientSettings) -> Result<Self> {
        let (api_base, compat_base) = if api_base.contains("/openai") {
            (DEFAULT_API_BASE.to_string(), api_base.to_string())
        } else if api_base.is_empty() {
            (DEFAULT_API_BASE.to_string(), OPENAI_COMPAT_BASE.to_string())
        } else {
            (api_base.trim_end_matches('/').to_string(), OPENAI_COMPAT_BASE.to_string())
        };

        Ok(Self {
            client: build_http_client(&settings)?,
            api_base,
            compat_base,
            api_key,
            model,
            settings,
            mode: OnceCell::new(),
        })
    }

    /// Endpoint mode detected so far
    pub fn mode(&self) -> Option<GeminiMode> {
        self.mode.get().copied()
    }

    fn native_body(request: &LlmRequest) -> Value {
        let mut generation_config = json!({ "temperature": request.temperature });
        if request.json_mode {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.user }] }],
            "generationConfig": generation_config,
        });
        if !request.system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }
        body
    }

    async fn call_native(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        debug!("Sending Gemini native request to: {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::native_body(request))
            .send()
            .await?;
        let parsed: GenerateResponse = check_status(response).await?.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(KaocheError::Llm("Gemini returned an empty response".to_string()));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            model: parsed.model_version.unwrap_or_else(|| self.model.clone()),
            usage,
        })
    }

    async fn call_mode(&self, mode: GeminiMode, request: &LlmRequest) -> Result<LlmResponse> {
        retry_with_backoff(
            || async move {
                match mode {
                    GeminiMode::Native => self.call_native(request).await,
                    GeminiMode::OpenAiCompatible => {
                        chat_completion(&self.client, &self.compat_base, &self.api_key, &self.model, request).await
                    }
                }
            },
            self.settings.max_retries,
            self.settings.backoff_base,
        )
        .await
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        if let Some(mode) = self.mode() {
            return self.call_mode(mode, request).await;
        }

        match self.call_mode(GeminiMode::Native, request).await {
            Ok(response) => {
                let _ = self.mode.set(GeminiMode::Native);
                info!("Gemini native API mode selected");
                Ok(response)
            }
            Err(native_err) => {
                warn!("Gemini native API failed: {}", native_err);
                match self.call_mode(GeminiMode::OpenAiCompatible, request).await {
                    Ok(response) => {
                        let _ = self.mode.set(GeminiMode::OpenAiCompatible);
                        info!("Gemini OpenAI-compatible mode selected");
                        Ok(response)
                    }
                    Err(compat_err) => Err(KaocheError::Llm(format!(
                        "Gemini API call failed\nnative: {}\nopenai: {}",
                        native_err, compat_err
                    ))),
                }
            }
        }
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_body() {
        let request = LlmRequest::new("You review subtitles", "Line 1").json().temperature(0.5);
        let body = GeminiClient::native_body(&request);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Line 1");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You review subtitles");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_base_selection() {
        let settings = ClientSettings::default();
        let client = GeminiClient::new("", "k".into(), "gemini-2.0-flash".into(), settings).unwrap();
        assert_eq!(client.api_base, DEFAULT_API_BASE);
        assert_eq!(client.compat_base, OPENAI_COMPAT_BASE);
        assert_eq!(client.mode(), None);

        let proxied = GeminiClient::new("https://proxy/v1beta/openai/", "k".into(), "g".into(), settings).unwrap();
        assert_eq!(proxied.compat_base, "https://proxy/v1beta/openai/");
    }
}
