//! Embedding backends.
//!
//! [`OllamaEmbedder`] calls Ollama's `/api/embed`. [`HashingEmbedder`]
//! produces deterministic feature-hashed term-frequency vectors locally;
//! it needs no network and is what tests and air-gapped setups use.

use crate::config::{EmbedderKind, KnowledgeConfig, ModelConfig};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request to {url} failed: {message}")]
    Request { url: String, message: String, transient: bool },

    #[error("embedding backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("embedding backend returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

impl EmbedError {
    fn is_transient(&self) -> bool {
        match self {
            EmbedError::Request { transient, .. } => *transient,
            EmbedError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            EmbedError::CountMismatch { .. } => false,
        }
    }
}

/// Text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Backend and model that produced the vectors, e.g. `ollama:nomic-embed-text`.
    /// Vectors from different identities are not comparable.
    fn identity(&self) -> String;
}

/// Select the embedding backend from configuration.
pub fn from_config(knowledge: &KnowledgeConfig, model: &ModelConfig) -> Result<Arc<dyn Embedder>> {
    Ok(match knowledge.embedder {
        EmbedderKind::Ollama => Arc::new(OllamaEmbedder::new(
            &model.ollama_url,
            &knowledge.embed_model,
            model.timeout_seconds,
            model.retries,
        )?),
        EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(knowledge.hashing_dimensions)),
    })
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama `/api/embed` backend.
pub struct OllamaEmbedder {
    http_client: reqwest::Client,
    url: String,
    model: String,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    pub fn new(ollama_url: &str, model: &str, timeout_seconds: u64, retries: u32) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client for embeddings")?;

        Ok(Self {
            http_client,
            url: format!("{}/api/embed", ollama_url.trim_end_matches('/')),
            model: model.to_string(),
            retry: RetryPolicy::with_retries(retries),
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbedError::Request {
                url: self.url.clone(),
                transient: e.is_timeout() || e.is_connect(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status { status, body });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| EmbedError::Request {
            url: self.url.clone(),
            transient: false,
            message: e.to_string(),
        })?;

        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                got: parsed.embeddings.len(),
            });
        }

        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("Embedding request", EmbedError::is_transient, || self.embed_once(texts))
            .await
    }

    fn identity(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

/// Deterministic feature-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// FNV-1a bucket for a term.
    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % self.dimensions
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.chars().count() >= 2)
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// L2-normalized term-frequency vector.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimensions];
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return vec;
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        for (term, count) in tf {
            // Longer terms carry more meaning than short function words.
            let weight = 1.0 + (term.len() as f32).ln();
            vec[self.bucket(term)] += (count / total) * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn identity(&self) -> String {
        format!("hashing:{}", self.dimensions)
    }
}
