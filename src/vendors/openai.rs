//! OpenAI-compatible chat completions client.
//!
//! This module provides a minimal client for OpenAI-compatible chat APIs
//! (OpenAI, Groq, and other providers speaking the same protocol), supporting
//! non-streaming completions and SSE streaming. The [`ChatCompletions`] trait
//! is the capability surface the instrumentation adapters wrap.

use crate::error::{ObsyError, Result};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use tracing::{debug, info, warn};

/// Configuration for connecting to an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<std::time::Duration>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: std::env::var("OPENAI_API_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            timeout: None,
        }
    }
}

/// Message role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request body for a chat completion.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// One completion choice in a non-streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Non-streaming chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

/// Incremental delta within a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice within a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// One element of a streamed chat completion.
///
/// `usage` follows the OpenAI placement; Groq reports it under `x_groq`
/// instead, which is carried through for summary extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_groq: Option<Value>,
}

pub type ChatCompletionStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// Capability surface for chat completion providers.
///
/// Implemented by [`OpenAiClient`] and by the instrumented wrapper, so a call
/// site written against this trait can be observed without changing.
#[async_trait]
pub trait ChatCompletions: Send + Sync {
    /// Request a completion and await the full response.
    async fn create(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse>;

    /// Request a completion streamed as incremental chunks.
    fn create_stream(&self, request: ChatCompletionRequest) -> ChatCompletionStream;
}

/// Client for OpenAI-compatible chat APIs.
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a new client with default configuration.
    pub fn new() -> Self {
        Self::with_config(OpenAiConfig::default())
    }

    /// Create a new client with custom configuration.
    pub fn with_config(config: OpenAiConfig) -> Self {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build().unwrap_or_default();

        Self { client, config }
    }

    /// Create a client with a custom API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAiConfig {
            api_key: api_key.into(),
            ..Default::default()
        })
    }

    /// Create a client with a custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self::with_config(OpenAiConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatCompletions for OpenAiClient {
    async fn create(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        info!("Requesting chat completion");
        debug!(model = %request.model, messages = request.messages.len(), "Completion request");

        let mut body = serde_json::to_value(&request)?;
        body["stream"] = Value::Bool(false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ObsyError::ApiError(format!(
                "chat completions: {} - {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }

    fn create_stream(&self, request: ChatCompletionRequest) -> ChatCompletionStream {
        let client = self.client.clone();
        let config = self.config.clone();

        Box::pin(async_stream::stream! {
            info!("Starting streaming chat completion");
            debug!(model = %request.model, messages = request.messages.len(), "Stream request");

            let mut body = match serde_json::to_value(&request) {
                Ok(body) => body,
                Err(err) => {
                    yield Err(err.into());
                    return;
                }
            };
            body["stream"] = Value::Bool(true);

            let response = match client
                .post(format!("{}/chat/completions", config.base_url))
                .header("Authorization", format!("Bearer {}", config.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    yield Err(err.into());
                    return;
                }
            };

            if !response.status().is_success() {
                yield Err(ObsyError::ApiError(format!(
                    "chat completions: {}",
                    response.status()
                )));
                return;
            }

            // Process SSE stream
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(bytes) => {
                        if let Ok(text) = std::str::from_utf8(&bytes) {
                            buffer.push_str(text);

                            // Process complete SSE lines
                            while let Some(line_end) = buffer.find('\n') {
                                let line = buffer[..line_end].trim().to_string();
                                buffer = buffer[line_end + 1..].to_string();

                                if line.is_empty() || !line.starts_with("data: ") {
                                    continue;
                                }

                                let data = &line["data: ".len()..];

                                if data == "[DONE]" {
                                    return;
                                }

                                match serde_json::from_str::<ChatCompletionChunk>(data) {
                                    Ok(chunk) => yield Ok(chunk),
                                    Err(err) => {
                                        warn!(error = %err, "Failed to parse streaming chunk, skipping");
                                    }
                                }
                            }
                        }
                    }
                    Err(err) => {
                        yield Err(err.into());
                        return;
                    }
                }
            }
        })
    }
}
