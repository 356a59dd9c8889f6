//! Request orchestration: fetch, score, advise, summarize.

use crate::advice::{degraded, AdviceComposer};
use crate::analysis::{kpi_summary, score_all, top_n};
use crate::audit::RunLog;
use crate::config::{AdviceFailurePolicy, Config};
use crate::knowledge::KnowledgeBase;
use crate::llm::TextGenerator;
use crate::models::{
    AnalyzeResponse, HealthReport, KnowledgeSnippet, ReindexReport, RunEntry, ScoredTicket,
    SkippedTicket, Suggestion, SuggestionSet, SummarizeResponse,
};
use crate::pipeline::bubble::bubble_up;
use crate::report::{SummaryComposer, GLOBAL_ACTIONS};
use crate::tickets::TicketSource;
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_n: usize,
    pub top_k: usize,
    pub advice_failure: AdviceFailurePolicy,
    pub advice_temperature: f32,
    pub summary_temperature: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_n: config.pipeline.top_n,
            top_k: config.knowledge.top_k,
            advice_failure: config.pipeline.advice_failure,
            advice_temperature: config.model.temperature,
            summary_temperature: config.model.summary_temperature,
        }
    }
}

/// Retrieval topic for a ticket category.
pub fn remediation_topic(category: &str) -> String {
    format!("{} remediation runbook", category)
}

/// Wires the ticket source, knowledge base, generator and run log together.
pub struct Pipeline {
    tickets: Arc<dyn TicketSource>,
    knowledge: Arc<KnowledgeBase>,
    generator: Arc<dyn TextGenerator>,
    run_log: Arc<dyn RunLog>,
    advice: AdviceComposer,
    summary: SummaryComposer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        tickets: Arc<dyn TicketSource>,
        knowledge: Arc<KnowledgeBase>,
        generator: Arc<dyn TextGenerator>,
        run_log: Arc<dyn RunLog>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            advice: AdviceComposer::new(Arc::clone(&generator), settings.advice_temperature),
            summary: SummaryComposer::new(Arc::clone(&generator), settings.summary_temperature),
            tickets,
            knowledge,
            generator,
            run_log,
            settings,
        }
    }

    /// Backend readiness. Not recorded in the run log.
    pub async fn health(&self) -> HealthReport {
        let available = self.generator.is_available();
        HealthReport {
            ok: true,
            llm: if available { "ready" } else { "disabled" }.to_string(),
            model: self.generator.model().to_string(),
            indexed_chunks: self.knowledge.indexed_chunks().await,
        }
    }

    /// Scored, ranked tickets plus due-date KPIs.
    pub async fn analyze(&self, dc_id: Option<&str>) -> Result<AnalyzeResponse> {
        self.audited("analyze", self.run_analyze(dc_id)).await
    }

    /// Executive summary plus per-ticket advice for the top-ranked tickets.
    pub async fn summarize(&self, dc_id: Option<&str>) -> Result<SummarizeResponse> {
        self.audited("summarize", self.run_summarize(dc_id)).await
    }

    /// Rebuild the knowledge index.
    pub async fn reindex(&self) -> ReindexReport {
        let started = Instant::now();
        let report = self.knowledge.reindex().await;
        self.record("reindex", started, report.ok);
        report
    }

    async fn run_analyze(&self, dc_id: Option<&str>) -> Result<AnalyzeResponse> {
        let tickets = self.tickets.fetch_open(dc_id).await?;
        info!("Analyzing {} tickets", tickets.len());

        Ok(AnalyzeResponse {
            dc_id: dc_id.map(str::to_string),
            kpi: kpi_summary(&tickets),
            tickets: score_all(&tickets),
        })
    }

    async fn run_summarize(&self, dc_id: Option<&str>) -> Result<SummarizeResponse> {
        let tickets = self.tickets.fetch_open(dc_id).await?;
        let scored = score_all(&tickets);
        let top = top_n(&scored, self.settings.top_n);
        info!("Scored {} tickets, advising top {}", scored.len(), top.len());

        let mut sources = BTreeSet::new();
        let mut per_ticket = Vec::with_capacity(top.len());
        let mut skipped = Vec::new();

        for ticket in &top {
            let snippets = self
                .knowledge
                .retrieve(&remediation_topic(&ticket.ticket.doc_category), self.settings.top_k)
                .await;
            sources.extend(snippets.iter().map(|s| s.source.clone()));

            if let Some(suggestion) = self.advise(ticket, &snippets, &mut skipped).await? {
                per_ticket.push(suggestion);
            }
        }

        let summary = self.summary.summarize(&scored, dc_id).await;

        Ok(SummarizeResponse {
            summary,
            actions: GLOBAL_ACTIONS.iter().map(|a| a.to_string()).collect(),
            suggestions: SuggestionSet {
                kb_sources: sources.into_iter().collect(),
                per_ticket,
                global_top3: bubble_up(),
                skipped,
            },
        })
    }

    /// Advice for one ticket, applying the failure policy.
    ///
    /// Without a generation backend every ticket gets the rule-only
    /// suggestion; that is not treated as a failure.
    async fn advise(
        &self,
        ticket: &ScoredTicket,
        snippets: &[KnowledgeSnippet],
        skipped: &mut Vec<SkippedTicket>,
    ) -> Result<Option<Suggestion>> {
        let id = &ticket.ticket.ticket_id;

        if !self.generator.is_available() {
            return Ok(Some(degraded(ticket)));
        }

        match self.advice.compose(ticket, snippets).await {
            Ok(suggestion) => Ok(Some(suggestion)),
            Err(e) => match self.settings.advice_failure {
                AdviceFailurePolicy::Skip => {
                    warn!("Skipping advice for {}: {}", id, e);
                    skipped.push(SkippedTicket {
                        ticket_id: id.clone(),
                        reason: e.to_string(),
                    });
                    Ok(None)
                }
                AdviceFailurePolicy::Degrade => {
                    warn!("Advice for {} failed, using rule-based advice: {}", id, e);
                    Ok(Some(degraded(ticket)))
                }
                AdviceFailurePolicy::Abort => {
                    Err(e).with_context(|| format!("Advice generation failed for ticket {}", id))
                }
            },
        }
    }

    async fn audited<T, F>(&self, endpoint: &str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = op.await;
        self.record(endpoint, started, result.is_ok());
        result
    }

    fn record(&self, endpoint: &str, started: Instant, ok: bool) {
        let entry = RunEntry {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            model: self.generator.model().to_string(),
            latency_ms: started.elapsed().as_millis() as u64,
            status: if ok { "OK" } else { "ERROR" }.to_string(),
        };

        match self.run_log.record(&entry) {
            Ok(()) => debug!("{} took {}ms", endpoint, entry.latency_ms),
            Err(e) => warn!("Failed to record {} run: {:#}", endpoint, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::MemoryRunLog;
    use crate::knowledge::retriever::testing::local_kb;
    use crate::llm::testing::ScriptedGenerator;
    use crate::llm::{GenerationError, NullGenerator};
    use crate::models::{Priority, Ticket};
    use crate::tickets::FetchError;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::fs;
    use std::sync::Mutex;

    struct FakeTickets {
        tickets: Vec<Ticket>,
        requested_dc: Mutex<Vec<Option<String>>>,
    }

    impl FakeTickets {
        fn new(tickets: Vec<Ticket>) -> Self {
            Self {
                tickets,
                requested_dc: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TicketSource for FakeTickets {
        async fn fetch_open(&self, dc_id: Option<&str>) -> Result<Vec<Ticket>, FetchError> {
            self.requested_dc.lock().unwrap().push(dc_id.map(str::to_string));
            Ok(self
                .tickets
                .iter()
                .filter(|t| dc_id.map_or(true, |dc| t.dc_id == dc))
                .cloned()
                .collect())
        }
    }

    struct DownTickets;

    #[async_trait]
    impl TicketSource for DownTickets {
        async fn fetch_open(&self, _dc_id: Option<&str>) -> Result<Vec<Ticket>, FetchError> {
            Err(FetchError::Status {
                url: "http://tickets.invalid/api/tickets".to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: String::new(),
            })
        }
    }

    fn ticket(id: &str, dc: &str, category: &str, priority: Priority, days: i64) -> Ticket {
        let mut t = Ticket::new(id, dc, category);
        t.priority = priority;
        t.days_to_due = Some(days);
        t.owner = Some("ops".to_string());
        t
    }

    fn fleet() -> Vec<Ticket> {
        vec![
            ticket("T1", "DC1", "Power", Priority::Low, 30),
            ticket("T2", "DC1", "HVAC", Priority::Medium, -2),
            ticket("T3", "DC2", "HVAC", Priority::High, 3),
        ]
    }

    fn advice_reply(rationale: &str) -> Result<String, GenerationError> {
        Ok(json!({
            "rationale": rationale,
            "nextActions": ["Call vendor", "Escalate", "Book window"],
            "urgency": "Escalate in 24h"
        })
        .to_string())
    }

    struct Harness {
        pipeline: Pipeline,
        run_log: Arc<MemoryRunLog>,
        _corpus: tempfile::TempDir,
    }

    fn harness(
        tickets: Arc<dyn TicketSource>,
        generator: Arc<dyn TextGenerator>,
        policy: AdviceFailurePolicy,
    ) -> Harness {
        let corpus = tempfile::tempdir().unwrap();
        fs::write(
            corpus.path().join("hvac.md"),
            "# HVAC remediation runbook\n\nCheck chiller compressor and refrigerant.",
        )
        .unwrap();
        fs::write(
            corpus.path().join("power.md"),
            "# Power remediation runbook\n\nTest UPS batteries and transfer switches.",
        )
        .unwrap();

        let run_log = Arc::new(MemoryRunLog::default());
        let settings = PipelineSettings {
            advice_failure: policy,
            top_k: 1,
            ..PipelineSettings::default()
        };
        let pipeline = Pipeline::new(
            tickets,
            Arc::new(local_kb(corpus.path())),
            generator,
            run_log.clone(),
            settings,
        );

        Harness {
            pipeline,
            run_log,
            _corpus: corpus,
        }
    }

    #[tokio::test]
    async fn test_summarize_with_generator() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            advice_reply("overdue chiller"),
            advice_reply("urgent hvac"),
            advice_reply("power later"),
            Ok("Three tickets, one overdue.".to_string()),
        ]));
        let h = harness(
            Arc::new(FakeTickets::new(fleet())),
            generator.clone(),
            AdviceFailurePolicy::Skip,
        );
        assert!(h.pipeline.reindex().await.ok);

        let response = h.pipeline.summarize(None).await.unwrap();

        assert_eq!(response.summary, "Three tickets, one overdue.");
        assert_eq!(response.actions, GLOBAL_ACTIONS.to_vec());
        let ids: Vec<_> = response
            .suggestions
            .per_ticket
            .iter()
            .map(|s| s.ticket_id.as_str())
            .collect();
        assert_eq!(ids, vec!["T2", "T3", "T1"]);
        assert_eq!(response.suggestions.kb_sources, vec!["hvac.md", "power.md"]);
        assert_eq!(response.suggestions.global_top3.len(), 3);
        assert!(response.suggestions.skipped.is_empty());
        assert_eq!(response.suggestions.per_ticket[0].suggested_owner.as_deref(), Some("ops"));

        assert!(generator.prompt(0).prompt.contains("[hvac.md]"));

        let entries = h.run_log.entries();
        let endpoints: Vec<_> = entries.iter().map(|e| e.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["reindex", "summarize"]);
        assert!(entries.iter().all(|e| e.status == "OK" && e.model == "scripted"));
    }

    #[tokio::test]
    async fn test_top_n_limits_advice() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            advice_reply("first"),
            Ok("summary".to_string()),
        ]));
        let mut h = harness(
            Arc::new(FakeTickets::new(fleet())),
            generator,
            AdviceFailurePolicy::Skip,
        );
        h.pipeline.settings.top_n = 1;

        let response = h.pipeline.summarize(None).await.unwrap();
        assert_eq!(response.suggestions.per_ticket.len(), 1);
        assert_eq!(response.suggestions.per_ticket[0].ticket_id, "T2");
        assert_eq!(response.summary, "summary");
    }

    #[tokio::test]
    async fn test_skip_policy_annotates_failures() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            advice_reply("ok"),
            Ok("not json".to_string()),
            advice_reply("ok"),
            Ok("summary".to_string()),
        ]));
        let h = harness(
            Arc::new(FakeTickets::new(fleet())),
            generator,
            AdviceFailurePolicy::Skip,
        );

        let response = h.pipeline.summarize(None).await.unwrap();
        assert_eq!(response.suggestions.per_ticket.len(), 2);
        assert_eq!(response.suggestions.skipped.len(), 1);
        assert_eq!(response.suggestions.skipped[0].ticket_id, "T3");
        assert!(response.suggestions.skipped[0].reason.contains("malformed"));
    }

    #[tokio::test]
    async fn test_degrade_policy_substitutes_rule_advice() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Err(GenerationError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
            advice_reply("ok"),
            advice_reply("ok"),
            Ok("summary".to_string()),
        ]));
        let h = harness(
            Arc::new(FakeTickets::new(fleet())),
            generator,
            AdviceFailurePolicy::Degrade,
        );

        let response = h.pipeline.summarize(None).await.unwrap();
        assert_eq!(response.suggestions.per_ticket.len(), 3);
        let first = &response.suggestions.per_ticket[0];
        assert_eq!(first.ticket_id, "T2");
        assert!(first.rationale.starts_with("Rule-based advice"));
        assert_eq!(first.urgency, "Escalate in 24h");
    }

    #[tokio::test]
    async fn test_abort_policy_fails_request() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(GenerationError::Connect {
            url: "http://localhost:11434/api/chat".to_string(),
        })]));
        let h = harness(
            Arc::new(FakeTickets::new(fleet())),
            generator,
            AdviceFailurePolicy::Abort,
        );

        let err = h.pipeline.summarize(None).await.unwrap_err();
        assert!(format!("{:#}", err).contains("ticket T2"));
        assert_eq!(h.run_log.entries()[0].status, "ERROR");
    }

    #[tokio::test]
    async fn test_summarize_without_generator_uses_fallbacks() {
        let h = harness(
            Arc::new(FakeTickets::new(fleet())),
            Arc::new(NullGenerator::new()),
            AdviceFailurePolicy::Skip,
        );

        let response = h.pipeline.summarize(Some("DC1")).await.unwrap();
        assert!(response.summary.starts_with("Executive Summary (DC DC1)"));
        assert!(response
            .summary
            .contains("- T2 | DC1 | HVAC | due in -2 days | risk Critical (13)"));
        assert_eq!(response.suggestions.per_ticket.len(), 2);
        assert!(response.suggestions.skipped.is_empty());
        // Index never built: no sources.
        assert!(response.suggestions.kb_sources.is_empty());
        assert_eq!(h.run_log.entries()[0].model, "none");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_hard_error() {
        let h = harness(
            Arc::new(DownTickets),
            Arc::new(NullGenerator::new()),
            AdviceFailurePolicy::Skip,
        );

        let err = h.pipeline.summarize(None).await.unwrap_err();
        assert!(err.to_string().contains("http://tickets.invalid/api/tickets"));
        assert!(h.pipeline.analyze(None).await.is_err());

        let statuses: Vec<_> = h.run_log.entries().into_iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec!["ERROR", "ERROR"]);
    }

    #[tokio::test]
    async fn test_analyze_reports_kpis_and_ranking() {
        let source = Arc::new(FakeTickets::new(fleet()));
        let h = harness(source.clone(), Arc::new(NullGenerator::new()), AdviceFailurePolicy::Skip);

        let response = h.pipeline.analyze(Some("DC1")).await.unwrap();
        assert_eq!(response.dc_id.as_deref(), Some("DC1"));
        assert_eq!(response.kpi.open, 2);
        assert_eq!(response.kpi.overdue, 1);
        assert_eq!(response.tickets[0].ticket.ticket_id, "T2");
        assert_eq!(
            source.requested_dc.lock().unwrap().as_slice(),
            &[Some("DC1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_run_log_failure_does_not_affect_response() {
        let corpus = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(FakeTickets::new(fleet())),
            Arc::new(local_kb(corpus.path())),
            Arc::new(NullGenerator::new()),
            Arc::new(MemoryRunLog::failing()),
            PipelineSettings::default(),
        );

        assert!(pipeline.analyze(None).await.is_ok());
        let report = pipeline.reindex().await;
        assert!(!report.ok);
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(
            Arc::new(FakeTickets::new(vec![])),
            Arc::new(NullGenerator::new()),
            AdviceFailurePolicy::Skip,
        );
        let health = h.pipeline.health().await;
        assert!(health.ok);
        assert_eq!(health.llm, "disabled");
        assert_eq!(health.model, "none");
        assert_eq!(health.indexed_chunks, 0);

        h.pipeline.reindex().await;
        assert_eq!(h.pipeline.health().await.indexed_chunks, 2);
        assert!(h.run_log.entries().iter().all(|e| e.endpoint == "reindex"));
    }
}
