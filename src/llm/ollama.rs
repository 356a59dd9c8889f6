//! Ollama chat backend.

use super::{CompletionRequest, GenerationError, TextGenerator};
use crate::config::ModelConfig;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Live generation backend speaking Ollama's `/api/chat`.
pub struct OllamaGenerator {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
    timeout_seconds: u64,
    retry: RetryPolicy,
}

impl OllamaGenerator {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for Ollama")?;

        Ok(Self {
            http_client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model_name: config.name.clone(),
            timeout_seconds: config.timeout_seconds,
            retry: RetryPolicy::with_retries(config.retries),
        })
    }

    /// Override the retry policy (tests use short intervals).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = request.system {
            messages.push(ChatMessage::new("system", system));
        }
        messages.push(ChatMessage::new("user", &request.prompt));

        let body = OllamaChatRequest {
            model: &self.model_name,
            messages,
            stream: false,
            format: request.json.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        url: url.clone(),
                        seconds: self.timeout_seconds,
                    }
                } else if e.is_connect() {
                    GenerationError::Connect { url: url.clone() }
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(format!("unreadable Ollama response: {}", e)))?;

        Ok(chat_response.message.content)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model_name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        debug!(
            "Sending {} chat request to {} ({} prompt chars)",
            if request.json { "JSON" } else { "text" },
            self.model_name,
            request.prompt.len()
        );

        self.retry
            .run("Generation request", GenerationError::is_transient, || self.send_once(request))
            .await
    }
}
