//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.slawatch.toml` files and CLI overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".slawatch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Ticketing API settings.
    #[serde(default)]
    pub tickets: TicketsConfig,

    /// Text-generation model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Knowledge base settings.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Run log settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Ticketing API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Base URL of the ticketing web application.
    #[serde(default = "default_tickets_url")]
    pub base_url: String,

    /// Status filter sent upstream. Empty disables the filter.
    #[serde(default = "default_status")]
    pub status: String,

    /// Request timeout in seconds.
    #[serde(default = "default_tickets_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient failures (429/502/503/504, timeouts).
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tickets_url(),
            status: default_status(),
            timeout_seconds: default_tickets_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_tickets_url() -> String {
    "http://localhost:5168".to_string()
}

fn default_status() -> String {
    "Open".to_string()
}

fn default_tickets_timeout() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Use the generation backend. When false the null backend is selected
    /// and every composer takes its deterministic path.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for advice generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Temperature for the executive summary.
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failure.
    #[serde(default = "default_model_retries")]
    pub retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            summary_temperature: default_summary_temperature(),
            timeout_seconds: default_model_timeout(),
            retries: default_model_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_summary_temperature() -> f32 {
    0.2
}

fn default_model_timeout() -> u64 {
    120
}

fn default_model_retries() -> u32 {
    2
}

/// Which embedding backend builds and queries the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Ollama `/api/embed`.
    #[default]
    Ollama,
    /// Local feature hashing; no network.
    Hashing,
}

/// Knowledge base settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Directory holding the `*.md` source documents.
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// File the index is persisted to.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Embedding backend.
    #[serde(default)]
    pub embedder: EmbedderKind,

    /// Embedding model (Ollama backend only).
    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Dimensions of the hashing embedder.
    #[serde(default = "default_hashing_dimensions")]
    pub hashing_dimensions: usize,

    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Snippets retrieved per ticket.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_dir: default_corpus_dir(),
            index_path: default_index_path(),
            embedder: EmbedderKind::default(),
            embed_model: default_embed_model(),
            hashing_dimensions: default_hashing_dimensions(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("kb")
}

fn default_index_path() -> PathBuf {
    PathBuf::from(".slawatch/kb_index.json")
}

fn default_embed_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_hashing_dimensions() -> usize {
    256
}

fn default_chunk_size() -> usize {
    800
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    3
}

/// What to do when advice for one ticket cannot be composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdviceFailurePolicy {
    /// Leave the ticket out, note it in `skipped`, continue.
    #[default]
    Skip,
    /// Substitute a rule-only suggestion.
    Degrade,
    /// Fail the whole request.
    Abort,
}

/// Pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of top-ranked tickets that receive advice.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Advice failure handling.
    #[serde(default)]
    pub advice_failure: AdviceFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            advice_failure: AdviceFailurePolicy::default(),
        }
    }
}

fn default_top_n() -> usize {
    8
}

/// Run log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Record runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite database holding the `ai_runs` table.
    #[serde(default = "default_run_log")]
    pub run_log: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_log: default_run_log(),
        }
    }
}

fn default_run_log() -> PathBuf {
    PathBuf::from(".slawatch/ai_monitor.db")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.tickets_url {
            self.tickets.base_url = url.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if args.no_llm {
            self.model.enabled = false;
        }
        if let Some(ref dir) = args.corpus_dir {
            self.knowledge.corpus_dir = dir.clone();
        }
        if let Some(top_n) = args.top_n {
            self.pipeline.top_n = top_n;
        }
        if let Some(policy) = args.on_advice_failure {
            self.pipeline.advice_failure = policy;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.2:latest");
        assert_eq!(config.tickets.base_url, "http://localhost:5168");
        assert_eq!(config.knowledge.chunk_size, 800);
        assert_eq!(config.knowledge.chunk_overlap, 100);
        assert_eq!(config.pipeline.top_n, 8);
        assert_eq!(config.pipeline.advice_failure, AdviceFailurePolicy::Skip);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[tickets]
base_url = "http://tickets.internal:8080"
retries = 1

[model]
enabled = false
name = "qwen2.5:14b"
temperature = 0.3

[knowledge]
embedder = "hashing"
corpus_dir = "runbooks"

[pipeline]
top_n = 5
advice_failure = "degrade"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.tickets.base_url, "http://tickets.internal:8080");
        assert_eq!(config.tickets.retries, 1);
        assert_eq!(config.tickets.timeout_seconds, 10);
        assert!(!config.model.enabled);
        assert_eq!(config.model.name, "qwen2.5:14b");
        assert_eq!(config.model.temperature, 0.3);
        assert_eq!(config.knowledge.embedder, EmbedderKind::Hashing);
        assert_eq!(config.knowledge.corpus_dir, PathBuf::from("runbooks"));
        assert_eq!(config.pipeline.top_n, 5);
        assert_eq!(config.pipeline.advice_failure, AdviceFailurePolicy::Degrade);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_general_verbose() {
        let config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert!(config.general.verbose);
        assert!(!Config::default().general.verbose);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[tickets]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[knowledge]"));
        assert!(toml_str.contains("[pipeline]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.knowledge.top_k, 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "[pipeline]\ntop_n = 2\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.pipeline.top_n, 2);
        assert!(Config::load(&dir.path().join("missing.toml")).is_err());
    }
}
