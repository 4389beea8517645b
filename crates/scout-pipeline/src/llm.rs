//! Client for the external reasoning service (an OpenAI-compatible
//! chat-completions endpoint asked to answer with one JSON object).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::PipelineError;

/// One structured request/response exchange with a reasoning service.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Send a system and user prompt, returning the parsed JSON object from
    /// the reply.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on transport failure, non-2xx status, an
    /// empty completion or a reply that is not JSON.
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, PipelineError>;
}

#[derive(Clone)]
pub struct OpenAiReasoningClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl std::fmt::Debug for OpenAiReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiReasoningClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl OpenAiReasoningClient {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: 0.3,
        })
    }

    /// Client for the globally configured key, or `None` when no key is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn from_app_config(config: &scout_core::AppConfig) -> Result<Option<Self>, PipelineError> {
        match config.reasoning_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Self::with_key(config, key).map(Some),
            _ => Ok(None),
        }
    }

    /// Client using the configured endpoint with an explicit key, e.g. a
    /// per-account override.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn with_key(config: &scout_core::AppConfig, api_key: &str) -> Result<Self, PipelineError> {
        Self::new(
            &config.reasoning_base_url,
            &config.reasoning_model,
            api_key.trim(),
            config.reasoning_timeout_secs,
        )
    }
}

#[async_trait]
impl ReasoningClient for OpenAiReasoningClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value, PipelineError> {
        let req_body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ReasoningStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: Value = response.json().await?;
        let content = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or(PipelineError::EmptyCompletion)?;

        parse_json_content(content)
    }
}

/// Parse a completion body as JSON, tolerating a Markdown code fence.
pub(crate) fn parse_json_content(content: &str) -> Result<Value, PipelineError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).map_err(|e| PipelineError::Parse {
        context: "reasoning completion".to_string(),
        source: e,
    })
}
