//! Slawatch - SLA risk scoring and remediation advice for data center tickets
//!
//! Pulls open tickets from the ticketing API, ranks them by SLA risk and
//! produces an executive summary with knowledge-grounded advice.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (ticketing API unreachable, config, failed reindex, etc.)

mod advice;
mod analysis;
mod audit;
mod cli;
mod config;
mod knowledge;
mod llm;
mod models;
mod pipeline;
mod report;
mod retry;
mod tickets;

use anyhow::{Context, Result};
use audit::{NullRunLog, RunLog, SqliteRunLog};
use cli::{Args, Command, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use knowledge::{ChunkConfig, CorpusScanner, KnowledgeBase, LocalVectorIndex};
use pipeline::{Pipeline, PipelineSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tickets::TicketClient;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // No logging needed to write the config template
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Config comes first so `[general] verbose` can pick the log level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose))?;

    info!("Slawatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle `init-config`: write a default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to point at your ticketing API, model and knowledge corpus.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Dispatch a subcommand. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let pipeline = build_pipeline(&config)?;

    match args.command {
        Command::Health => {
            let health = pipeline.health().await;
            write_output(&report::generate_json(&health)?, None)?;
        }

        Command::Analyze {
            ref dc,
            format,
            ref output,
        } => {
            let progress = spinner(&args, "Scoring open tickets...");
            let result = pipeline.analyze(dc.as_deref()).await;
            finish(progress);
            let response = result?;

            eprintln!(
                "📊 {} open | {} due ≤7d | {} due ≤21d | {} overdue",
                response.kpi.open, response.kpi.due_in7, response.kpi.due_in21, response.kpi.overdue
            );

            let content = match format {
                OutputFormat::Json => report::generate_json(&response)?,
                OutputFormat::Markdown => report::generate_analysis_markdown(&response),
            };
            write_output(&content, output.as_deref())?;
        }

        Command::Summarize {
            ref dc,
            format,
            ref output,
        } => {
            let progress = spinner(&args, "Composing summary and ticket advice...");
            let result = pipeline.summarize(dc.as_deref()).await;
            finish(progress);
            let response = result?;

            eprintln!(
                "📝 {} tickets advised, {} skipped, {} knowledge sources",
                response.suggestions.per_ticket.len(),
                response.suggestions.skipped.len(),
                response.suggestions.kb_sources.len()
            );

            let content = match format {
                OutputFormat::Json => report::generate_json(&response)?,
                OutputFormat::Markdown => {
                    report::generate_summary_markdown(&response, dc.as_deref())
                }
            };
            write_output(&content, output.as_deref())?;
        }

        Command::Reindex => {
            let progress = spinner(
                &args,
                &format!("Indexing {}...", config.knowledge.corpus_dir.display()),
            );
            let outcome = pipeline.reindex().await;
            finish(progress);

            write_output(&report::generate_json(&outcome)?, None)?;
            if !outcome.ok {
                return Ok(1);
            }
        }

        Command::InitConfig => return handle_init_config().map(|_| 0),
    }

    Ok(0)
}

/// Assemble the pipeline from configuration.
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let tickets = Arc::new(TicketClient::new(&config.tickets)?);
    let generator = llm::from_config(&config.model)?;
    let embedder = knowledge::embedder::from_config(&config.knowledge, &config.model)?;

    let index = Arc::new(LocalVectorIndex::open(&config.knowledge.index_path));
    let knowledge = Arc::new(KnowledgeBase::new(
        embedder,
        index,
        CorpusScanner::new(&config.knowledge.corpus_dir),
        ChunkConfig::from(&config.knowledge),
    ));

    Ok(Pipeline::new(
        tickets,
        knowledge,
        generator,
        open_run_log(config),
        PipelineSettings::from(config),
    ))
}

/// Open the run log; an unusable database disables recording.
fn open_run_log(config: &Config) -> Arc<dyn RunLog> {
    if !config.audit.enabled {
        debug!("Run log disabled");
        return Arc::new(NullRunLog);
    }

    match SqliteRunLog::open(&config.audit.run_log) {
        Ok(log) => Arc::new(log),
        Err(e) => {
            warn!("Run log unavailable, runs will not be recorded: {:#}", e);
            Arc::new(NullRunLog)
        }
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", DEFAULT_CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}

/// Spinner on stderr, unless `--quiet`.
fn spinner(args: &Args, message: &str) -> Option<ProgressBar> {
    if args.quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn finish(progress: Option<ProgressBar>) {
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
}

/// Print to stdout, or write to `path` when given.
fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            eprintln!("✅ Saved to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
