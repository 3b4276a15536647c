//! OpenAI-compatible oracle client.
//!
//! Works with any `/chat/completions` endpoint: OpenAI, DashScope
//! compatible mode, OpenRouter, Ollama, vLLM. Defaults to the DashScope
//! compatible-mode endpoint.
//!
//! The client enforces its own request timeout so resolution can fall
//! through to the rule engine instead of blocking a request indefinitely.

use async_trait::async_trait;
use lingxi_config::OracleConfig;
use lingxi_core::error::OracleError;
use lingxi_core::oracle::{ChatMessage, Oracle, OracleRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// An OpenAI-compatible chat-completions client.
pub struct OpenAiCompatOracle {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatOracle {
    /// Create a new client. A missing API key is allowed — `chat` then
    /// returns `NotConfigured` and callers use the rule engine.
    pub fn new(
        api_key: Option<String>,
        base_url: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: "openai-compat".into(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.into(),
            client,
        }
    }

    /// Build a client from configuration.
    pub fn from_config(config: &OracleConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Override the base URL (for tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Oracle for OpenAiCompatOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: OracleRequest) -> Result<String, OracleError> {
        let Some(api_key) = &self.api_key else {
            return Err(OracleError::NotConfigured("LLM_API_KEY is not set".into()));
        };

        let body = ApiChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request
                .json_object
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, json_object = request.json_object, "Oracle: sending chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(format!("chat request to {url} timed out"))
                } else {
                    OracleError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(OracleError::AuthenticationFailed(
                "API key rejected by the oracle endpoint".into(),
            ));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Oracle: API error");
            return Err(OracleError::ApiError {
                status_code: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let parsed: ApiChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Malformed("response contained no choices".into()))?;

        debug!(chars = content.len(), "Oracle: received response");
        Ok(content)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
