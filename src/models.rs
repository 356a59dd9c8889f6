//! Data models for the SLA risk service.
//!
//! This module contains the core data structures shared by the scorer,
//! the knowledge retriever, the composers and the pipeline responses.
//! Field names follow the camelCase wire format of the ticketing API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days-to-due assumed when a ticket carries none ("far future").
pub const FAR_FUTURE_DAYS: i64 = 999;

/// Ticket priority as reported by the ticketing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Lenient parse: unknown or empty values fall back to Medium.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }

    /// Weight used by the risk formula.
    pub fn weight(&self) -> i64 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
        }
    }
}

/// Severity tier derived from a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskBucket {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBucket::Low => write!(f, "Low"),
            RiskBucket::Medium => write!(f, "Medium"),
            RiskBucket::High => write!(f, "High"),
            RiskBucket::Critical => write!(f, "Critical"),
        }
    }
}

impl RiskBucket {
    /// Returns an emoji representation of the bucket.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskBucket::Low => "🟢",
            RiskBucket::Medium => "🟡",
            RiskBucket::High => "🟠",
            RiskBucket::Critical => "🔴",
        }
    }

    /// Urgency label used when advice is built from local rules only.
    pub fn urgency(&self) -> &'static str {
        match self {
            RiskBucket::Critical => "Escalate in 24h",
            RiskBucket::High => "Do this week",
            RiskBucket::Medium => "Plan within 2 weeks",
            RiskBucket::Low => "Monitor",
        }
    }
}

/// A ticket in canonical form, as produced by the normalization adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: String,
    pub dc_id: String,
    pub doc_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_to_due: Option<i64>,
}

impl Ticket {
    /// Creates a ticket with only the mandatory fields set.
    pub fn new(ticket_id: impl Into<String>, dc_id: impl Into<String>, doc_category: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            dc_id: dc_id.into(),
            doc_category: doc_category.into(),
            owner: None,
            status: None,
            priority: Priority::Medium,
            created_at: None,
            due_date: None,
            days_to_due: None,
        }
    }

    /// Days to due with the far-future default applied.
    pub fn effective_days_to_due(&self) -> i64 {
        self.days_to_due.unwrap_or(FAR_FUTURE_DAYS)
    }
}

/// A ticket together with its derived risk.
///
/// `days_to_due` inside `ticket` holds the effective value used for scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[serde(rename = "RiskScore")]
    pub risk_score: i64,
    #[serde(rename = "RiskBucket")]
    pub risk_bucket: RiskBucket,
}

impl ScoredTicket {
    pub fn is_critical(&self) -> bool {
        self.risk_bucket == RiskBucket::Critical
    }

    pub fn days_to_due(&self) -> i64 {
        self.ticket.effective_days_to_due()
    }

    /// One-line digest: `- id | dc | category | due in N days | risk BUCKET (score)`.
    pub fn digest_line(&self) -> String {
        format!(
            "- {} | {} | {} | due in {} days | risk {} ({})",
            self.ticket.ticket_id,
            self.ticket.dc_id,
            self.ticket.doc_category,
            self.days_to_due(),
            self.risk_bucket,
            self.risk_score
        )
    }
}

/// A retrieved knowledge chunk and the document it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub chunk: String,
    pub source: String,
}

/// Structured remediation advice for a single ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub ticket_id: String,
    pub rationale: String,
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub suggested_owner: Option<String>,
    pub urgency: String,
}

/// A ticket whose advice could not be composed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTicket {
    pub ticket_id: String,
    pub reason: String,
}

/// Cross-ticket canned recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleUp {
    pub title: String,
    pub why: String,
    pub steps: Vec<String>,
}

/// Per-ticket advice plus everything aggregated across tickets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSet {
    pub kb_sources: Vec<String>,
    pub per_ticket: Vec<Suggestion>,
    pub global_top3: Vec<BubbleUp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTicket>,
}

/// Response of the summarize operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
    pub actions: Vec<String>,
    pub suggestions: SuggestionSet,
}

/// Open-ticket due-date counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    pub open: usize,
    pub due_in21: usize,
    pub due_in7: usize,
    pub overdue: usize,
}

/// Response of the analyze operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_id: Option<String>,
    pub kpi: KpiSummary,
    pub tickets: Vec<ScoredTicket>,
}

/// Outcome of a knowledge index rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReindexReport {
    pub ok: bool,
    pub indexed: usize,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ReindexReport {
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            indexed: 0,
            files: Vec::new(),
            detail: Some(detail.into()),
        }
    }
}

/// Response of the health operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ok: bool,
    pub llm: String,
    pub model: String,
    pub indexed_chunks: usize,
}

/// One row of the append-only run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub model: String,
    pub latency_ms: u64,
    pub status: String,
}
