//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::AdviceFailurePolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Slawatch - SLA risk scoring and remediation advice for data center tickets
///
/// Pulls open tickets from the ticketing API, scores their SLA risk and
/// produces an executive summary with per-ticket remediation advice,
/// grounded by a local knowledge base of runbooks.
///
/// Examples:
///   slawatch health
///   slawatch analyze --dc DC-EAST
///   slawatch summarize --format markdown --output summary.md
///   slawatch --no-llm summarize
///   slawatch reindex
///   slawatch init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .slawatch.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the ticketing API
    #[arg(long, value_name = "URL", env = "SLAWATCH_TICKETS_URL", global = true)]
    pub tickets_url: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, value_name = "URL", env = "OLLAMA_URL", global = true)]
    pub ollama_url: Option<String>,

    /// Ollama model used for advice and summaries
    #[arg(short, long, env = "SLAWATCH_MODEL", global = true)]
    pub model: Option<String>,

    /// Temperature for advice generation (0.0 - 1.0)
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Disable the generation backend; use deterministic fallbacks only
    #[arg(long, global = true)]
    pub no_llm: bool,

    /// Directory of knowledge base documents (*.md)
    #[arg(long, value_name = "DIR", global = true)]
    pub corpus_dir: Option<PathBuf>,

    /// Number of top-ranked tickets that receive advice
    #[arg(long, value_name = "COUNT", global = true)]
    pub top_n: Option<usize>,

    /// What to do when advice for a ticket cannot be generated
    #[arg(long, value_name = "POLICY", global = true)]
    pub on_advice_failure: Option<AdviceFailurePolicy>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report service readiness
    Health,

    /// Score and rank open tickets
    Analyze {
        /// Restrict to one data center
        #[arg(long, value_name = "DC_ID")]
        dc: Option<String>,

        /// Output format (json, markdown)
        #[arg(long, default_value = "json", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the response to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Produce the executive summary and per-ticket advice
    Summarize {
        /// Restrict to one data center
        #[arg(long, value_name = "DC_ID")]
        dc: Option<String>,

        /// Output format (json, markdown)
        #[arg(long, default_value = "json", value_name = "FORMAT")]
        format: OutputFormat,

        /// Write the response to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rebuild the knowledge index from the corpus directory
    Reindex,

    /// Generate a default .slawatch.toml configuration file
    InitConfig,
}

/// Output format for responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON response body (default)
    #[default]
    Json,
    /// Markdown report
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [
            ("Ticketing API URL", &self.tickets_url),
            ("Ollama URL", &self.ollama_url),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("{} must start with 'http://' or 'https://'", name));
                }
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if self.top_n == Some(0) {
            return Err("Top-N must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.corpus_dir {
            if !dir.is_dir() {
                return Err(format!("Corpus directory does not exist: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `default_verbose` is `[general] verbose` from the config file;
    /// `--quiet` overrides it.
    pub fn log_level(&self, default_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || default_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
