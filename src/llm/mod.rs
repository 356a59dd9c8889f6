//! Text-generation capability.
//!
//! The composers talk to a [`TextGenerator`]. Two implementations exist:
//! [`OllamaGenerator`] for a live backend and [`NullGenerator`], a
//! deterministic null object used when generation is disabled. The choice
//! is made once at startup by [`from_config`].

pub mod null;
pub mod ollama;

pub use null::NullGenerator;
pub use ollama::OllamaGenerator;

use crate::config::ModelConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A chat-style completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    /// Constrain the backend to emit a JSON object.
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature,
            json: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Failure of a generation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no generation backend configured")]
    Unavailable,

    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("cannot connect to generation backend at {url}")]
    Connect { url: String },

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generation output: {0}")]
    Malformed(String),
}

impl GenerationError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout { .. } | GenerationError::Connect { .. } => true,
            GenerationError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            _ => false,
        }
    }
}

/// Chat completion capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier reported in responses and the run log.
    fn model(&self) -> &str;

    /// Whether completions can be requested at all.
    fn is_available(&self) -> bool;

    /// Run one completion and return the assistant text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Select the generation backend from configuration.
pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn TextGenerator>> {
    if !config.enabled {
        info!("Generation backend disabled; using deterministic fallbacks");
        return Ok(Arc::new(NullGenerator::new()));
    }

    info!("Generation backend: Ollama {} ({})", config.name, config.ollama_url);
    Ok(Arc::new(OllamaGenerator::new(config)?))
}
