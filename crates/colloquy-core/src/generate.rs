//! Reply generation over an OpenAI-compatible chat completions API.
//!
//! The session core treats reply generation as an opaque collaborator:
//! ordered history in, assistant text out. It is reachable independently of
//! the transport and is not part of the wire protocol.

use std::fmt;

use async_trait::async_trait;
use tracing::debug;

use crate::conversation::{Message, Role};

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Given the ordered message history, returns assistant text or fails with a
/// generation error.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, history: &[Message]) -> Result<String, GenerationError>;
}

/// OpenAI client configuration.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }

    /// Read the API key from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, GenerationError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(GenerationError::Api(
                "OpenAI API not configured. Set OPENAI_API_KEY.".into(),
            )),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Models known to work with the chat completions endpoint.
    pub fn available_models() -> &'static [&'static str] {
        &["gpt-4", "gpt-4-32k", "gpt-3.5-turbo", "gpt-3.5-turbo-16k"]
    }
}

/// Reply generator backed by the OpenAI chat completions API.
pub struct OpenAiGenerator {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    fn build_request_body(&self, history: &[Message]) -> serde_json::Value {
        let messages: Vec<_> = history
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::System => "system",
                };
                serde_json::json!({
                    "role": role,
                    "content": msg.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
        })
    }

    fn parse_response(&self, json: serde_json::Value) -> String {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| "No response generated".to_string())
    }
}

#[async_trait]
impl ReplyGenerator for OpenAiGenerator {
    async fn generate(&self, history: &[Message]) -> Result<String, GenerationError> {
        let body = self.build_request_body(history);

        debug!(model = %self.config.model, turns = history.len(), "OpenAI API request");

        let response = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(GenerationError::Api(format!("HTTP {status}: {text}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        Ok(self.parse_response(json))
    }
}
