//! Markdown rendering of pipeline responses.
//!
//! JSON is the canonical output; these renderers give the same content a
//! human-readable form for `--format markdown`.

use crate::analysis::aggregator::bucket_counts;
use crate::models::{AnalyzeResponse, RiskBucket, ScoredTicket, Suggestion, SummarizeResponse};
use anyhow::Result;
use serde::Serialize;

const BUCKETS: [RiskBucket; 4] = [
    RiskBucket::Critical,
    RiskBucket::High,
    RiskBucket::Medium,
    RiskBucket::Low,
];

/// Render a summarize response.
pub fn generate_summary_markdown(response: &SummarizeResponse, dc_id: Option<&str>) -> String {
    let mut output = String::new();

    match dc_id {
        Some(dc) => output.push_str(&format!("# SLA Risk Summary: {}\n\n", dc)),
        None => output.push_str("# SLA Risk Summary\n\n"),
    }

    output.push_str("## Executive Summary\n\n");
    output.push_str(response.summary.trim());
    output.push_str("\n\n");

    output.push_str("## Actions\n\n");
    for action in &response.actions {
        output.push_str(&format!("- {}\n", action));
    }
    output.push('\n');

    output.push_str(&generate_advice_section(&response.suggestions.per_ticket));

    if !response.suggestions.skipped.is_empty() {
        output.push_str("## Skipped Tickets\n\n");
        for skipped in &response.suggestions.skipped {
            output.push_str(&format!("- `{}`: {}\n", skipped.ticket_id, skipped.reason));
        }
        output.push('\n');
    }

    if !response.suggestions.global_top3.is_empty() {
        output.push_str("## Recommendations\n\n");
        for (i, rec) in response.suggestions.global_top3.iter().enumerate() {
            output.push_str(&format!("{}. **{}** ({})\n", i + 1, rec.title, rec.why));
            for step in &rec.steps {
                output.push_str(&format!("   - {}\n", step));
            }
        }
        output.push('\n');
    }

    if !response.suggestions.kb_sources.is_empty() {
        output.push_str("## Knowledge Sources\n\n");
        for source in &response.suggestions.kb_sources {
            output.push_str(&format!("- `{}`\n", source));
        }
        output.push('\n');
    }

    output
}

fn generate_advice_section(suggestions: &[Suggestion]) -> String {
    let mut section = String::new();
    section.push_str("## Ticket Advice\n\n");

    if suggestions.is_empty() {
        section.push_str("No ticket advice was produced.\n\n");
        return section;
    }

    for s in suggestions {
        section.push_str(&format!("### {}\n\n", s.ticket_id));
        if !s.urgency.is_empty() {
            section.push_str(&format!("**Urgency:** {}\n\n", s.urgency));
        }
        if let Some(ref owner) = s.suggested_owner {
            section.push_str(&format!("**Suggested owner:** {}\n\n", owner));
        }
        if !s.rationale.is_empty() {
            section.push_str(&format!("{}\n\n", s.rationale));
        }
        for (i, action) in s.next_actions.iter().enumerate() {
            section.push_str(&format!("{}. {}\n", i + 1, action));
        }
        section.push('\n');
    }

    section
}

/// Render an analyze response.
pub fn generate_analysis_markdown(response: &AnalyzeResponse) -> String {
    let mut output = String::new();

    match response.dc_id {
        Some(ref dc) => output.push_str(&format!("# SLA Risk Analysis: {}\n\n", dc)),
        None => output.push_str("# SLA Risk Analysis\n\n"),
    }

    output.push_str("## KPIs\n\n");
    output.push_str("| Open | Due ≤7d | Due ≤21d | Overdue |\n");
    output.push_str("|:---:|:---:|:---:|:---:|\n");
    output.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        response.kpi.open, response.kpi.due_in7, response.kpi.due_in21, response.kpi.overdue
    ));

    output.push_str(&generate_bucket_table(&response.tickets));
    output.push_str(&generate_ticket_table(&response.tickets));

    output
}

fn generate_bucket_table(tickets: &[ScoredTicket]) -> String {
    let counts = bucket_counts(tickets);
    let mut section = String::new();

    section.push_str("## Risk Buckets\n\n");
    let header: Vec<String> = BUCKETS.iter().map(|b| format!("{} {}", b.emoji(), b)).collect();
    section.push_str(&format!("| {} |\n", header.join(" | ")));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    let row: Vec<String> = BUCKETS
        .iter()
        .map(|b| counts.get(b).copied().unwrap_or(0).to_string())
        .collect();
    section.push_str(&format!("| {} |\n\n", row.join(" | ")));

    section
}

fn generate_ticket_table(tickets: &[ScoredTicket]) -> String {
    let mut section = String::new();
    section.push_str("## Ranked Tickets\n\n");

    if tickets.is_empty() {
        section.push_str("No open tickets.\n\n");
        return section;
    }

    section.push_str("| Ticket | DC | Category | Priority | Owner | Due in | Risk |\n");
    section.push_str("|:---|:---|:---|:---:|:---|:---:|:---|\n");
    for t in tickets {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} {} ({}) |\n",
            t.ticket.ticket_id,
            t.ticket.dc_id,
            t.ticket.doc_category,
            t.ticket.priority,
            t.ticket.owner.as_deref().unwrap_or("-"),
            t.days_to_due(),
            t.risk_bucket.emoji(),
            t.risk_bucket,
            t.risk_score
        ));
    }
    section.push('\n');

    section
}

/// Pretty-printed JSON for any response body.
pub fn generate_json<T: Serialize>(response: &T) -> Result<String> {
    serde_json::to_string_pretty(response).map_err(Into::into)
}
