//! Executive summary over a ranked ticket set.
//!
//! With a generation backend the top tickets are handed to the model; the
//! deterministic fallback is used when no backend is configured, when the
//! call fails, or when it returns nothing.

use crate::analysis::top_n;
use crate::llm::{CompletionRequest, TextGenerator};
use crate::models::ScoredTicket;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tickets quoted in the generation prompt.
pub const PROMPT_TICKETS: usize = 8;
/// Tickets listed in the fallback summary.
pub const FALLBACK_TICKETS: usize = 4;

/// Global actions attached to every summary.
pub const GLOBAL_ACTIONS: [&str; 3] = [
    "Escalate Critical within 24h",
    "Reassign High risk to available owners",
    "Add weekly check for categories trending to overdue",
];

fn digest(scored: &[ScoredTicket], n: usize) -> Vec<String> {
    top_n(scored, n).iter().map(ScoredTicket::digest_line).collect()
}

/// Deterministic summary; never fails.
pub fn fallback_summary(scored: &[ScoredTicket], dc_id: Option<&str>) -> String {
    let scope = match dc_id {
        Some(dc) => format!("DC {}", dc),
        None => "Global".to_string(),
    };
    let lines = digest(scored, FALLBACK_TICKETS);
    let actions: Vec<String> = GLOBAL_ACTIONS.iter().map(|a| format!("- {}", a)).collect();

    format!(
        "Executive Summary ({}): generated locally.\nTop {} risky tickets:\n{}\n\nActions:\n{}",
        scope,
        lines.len(),
        lines.join("\n"),
        actions.join("\n")
    )
}

fn build_prompt(scored: &[ScoredTicket], dc_id: Option<&str>) -> String {
    let scope = dc_id
        .map(|dc| format!(" Scope: data center {}.", dc))
        .unwrap_or_default();

    format!(
        "You are an SRE/operations assistant. Produce a concise, executive summary of SLA risk for data centers. \
Include a 1-paragraph overview, a short prioritized list of the top risks, and 3 concrete next actions. \
Use neutral, professional language.{} Input tickets:\n{}",
        scope,
        digest(scored, PROMPT_TICKETS).join("\n")
    )
}

/// Composes the executive summary.
pub struct SummaryComposer {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
}

impl SummaryComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, temperature: f32) -> Self {
        Self {
            generator,
            temperature,
        }
    }

    pub async fn summarize(&self, scored: &[ScoredTicket], dc_id: Option<&str>) -> String {
        if !self.generator.is_available() {
            debug!("No generation backend; using local summary");
            return fallback_summary(scored, dc_id);
        }

        let request = CompletionRequest::new(build_prompt(scored, dc_id), self.temperature);
        match self.generator.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Summary generation returned empty text; using local summary");
                fallback_summary(scored, dc_id)
            }
            Err(e) => {
                warn!("Summary generation failed: {}", e);
                format!(
                    "{}\n\n(Note: generation call failed: {})",
                    fallback_summary(scored, dc_id),
                    e
                )
            }
        }
    }
}
