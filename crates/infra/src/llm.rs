//! Text-generation collaborators.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use thiserror::Error;
use tracing::debug;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is disabled")]
    Disabled,

    #[error("language model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Raw generated text for `prompt`. May echo the prompt or wrap JSON in prose.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn name(&self) -> &str;
}

/// Used when no token is configured; every call fails fast with [`LlmError::Disabled`].
#[derive(Debug, Default, Copy, Clone)]
pub struct DisabledLlm;

#[async_trait]
impl LlmClient for DisabledLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Hugging Face Inference API text-generation endpoint.
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HuggingFaceClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl LlmClient for HuggingFaceClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let raw: JsonValue = response.json().await?;
        let text = generated_text(raw);
        debug!(chars = text.len(), "model response received");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

/// `[{"generated_text": ...}]` yields the text; any other shape is stringified.
pub fn generated_text(raw: JsonValue) -> String {
    if let Some(text) = raw
        .as_array()
        .and_then(|a| a.first())
        .and_then(|first| first.get("generated_text"))
        .and_then(JsonValue::as_str)
    {
        return text.to_string();
    }
    match raw {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

/// Client for the configured endpoint, or [`DisabledLlm`] when no token is set.
pub fn client_from_config(config: &LlmConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    match &config.token {
        Some(token) => Ok(Box::new(HuggingFaceClient::new(&config.url, token, config.timeout)?)),
        None => Ok(Box::new(DisabledLlm)),
    }
}
