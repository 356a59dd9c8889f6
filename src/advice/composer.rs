//! Per-ticket advice composition.

use crate::advice::rules::{rule_hints, PAD_STEPS};
use crate::llm::{CompletionRequest, GenerationError, TextGenerator};
use crate::models::{KnowledgeSnippet, ScoredTicket, Suggestion};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Maximum snippets quoted in a prompt.
pub const MAX_CONTEXT_SNIPPETS: usize = 3;
/// Maximum actions kept per suggestion.
pub const MAX_ACTIONS: usize = 6;
/// Maximum rationale length in characters.
pub const MAX_RATIONALE_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str = "You are a data center operations SRE assistant. \
Propose concrete, low-risk steps that move work forward today. \
Prefer checklists, owners, and timeboxes. Keep each action short.";

/// Render snippets as `[source]\nchunk` blocks separated by blank lines.
pub fn build_context(snippets: &[KnowledgeSnippet]) -> String {
    if snippets.is_empty() {
        return "No KB found.".to_string();
    }
    snippets
        .iter()
        .take(MAX_CONTEXT_SNIPPETS)
        .map(|s| format!("[{}]\n{}", s.source, s.chunk))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(ticket: &ScoredTicket, snippets: &[KnowledgeSnippet]) -> String {
    let t = &ticket.ticket;
    let hints: String = rule_hints(ticket)
        .iter()
        .map(|h| format!("- {}\n", h))
        .collect();

    format!(
        r#"Ticket:
- id: {}
- dataCenter: {}
- category: {}
- priority: {}
- daysToDue: {}
- risk: {} ({})

Local rules/hints:
{}
Knowledge Base (top matches):
{}

Output JSON with keys: rationale, nextActions (array of 3-6 steps), suggestedOwner, urgency.
"#,
        t.ticket_id,
        t.dc_id,
        t.doc_category,
        t.priority,
        ticket.days_to_due(),
        ticket.risk_bucket,
        ticket.risk_score,
        hints,
        build_context(snippets)
    )
}

fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn normalize_action(item: &Value) -> Option<String> {
    let action = match item {
        Value::Object(map) => {
            let step = non_empty_str(map.get("step"))
                .or_else(|| non_empty_str(map.get("action")))
                .unwrap_or("");
            let timebox = non_empty_str(map.get("timebox"))
                .or_else(|| non_empty_str(map.get("eta")))
                .unwrap_or("");
            if timebox.is_empty() {
                step.to_string()
            } else {
                format!("{} — {}", step, timebox).trim().to_string()
            }
        }
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    (!action.is_empty()).then_some(action)
}

/// Flatten the model's `nextActions` into plain strings.
///
/// Objects become `step — timebox`; empty entries are dropped and at most
/// [`MAX_ACTIONS`] are kept. A bare string counts as a single action.
pub fn normalize_actions(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(normalize_action)
            .take(MAX_ACTIONS)
            .collect(),
        Value::Null => Vec::new(),
        single => normalize_action(single).into_iter().collect(),
    }
}

/// Parse a JSON-mode reply into a suggestion for `ticket`.
pub fn parse_suggestion(ticket: &ScoredTicket, reply: &str) -> Result<Suggestion, GenerationError> {
    let data: Value = serde_json::from_str(reply.trim())
        .map_err(|e| GenerationError::Malformed(format!("reply is not JSON: {}", e)))?;

    let object = data
        .as_object()
        .ok_or_else(|| GenerationError::Malformed("reply is not a JSON object".to_string()))?;

    let rationale = match object.get("rationale") {
        Some(Value::String(s)) => s.chars().take(MAX_RATIONALE_CHARS).collect(),
        _ => String::new(),
    };

    let suggested_owner = non_empty_str(object.get("suggestedOwner"))
        .map(str::to_string)
        .or_else(|| ticket.ticket.owner.clone());

    let urgency = object
        .get("urgency")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(Suggestion {
        ticket_id: ticket.ticket.ticket_id.clone(),
        rationale,
        next_actions: normalize_actions(object.get("nextActions").unwrap_or(&Value::Null)),
        suggested_owner,
        urgency,
    })
}

/// Deterministic rule-only suggestion.
pub fn degraded(ticket: &ScoredTicket) -> Suggestion {
    let hints = rule_hints(ticket);

    let rationale = if hints.is_empty() {
        format!(
            "Rule-based advice: {} risk ({}), no due-date or priority rule triggered.",
            ticket.risk_bucket, ticket.risk_score
        )
    } else {
        format!("Rule-based advice: {}", hints.join(" "))
    };

    let mut next_actions: Vec<String> = hints.iter().map(|h| h.to_string()).collect();
    for step in PAD_STEPS {
        if next_actions.len() >= 3 {
            break;
        }
        next_actions.push(step.to_string());
    }

    Suggestion {
        ticket_id: ticket.ticket.ticket_id.clone(),
        rationale,
        next_actions,
        suggested_owner: ticket.ticket.owner.clone(),
        urgency: ticket.risk_bucket.urgency().to_string(),
    }
}

/// Composes advice through the generation backend.
pub struct AdviceComposer {
    generator: Arc<dyn TextGenerator>,
    temperature: f32,
}

impl AdviceComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, temperature: f32) -> Self {
        Self {
            generator,
            temperature,
        }
    }

    /// Ask the backend for a suggestion grounded in `snippets`.
    pub async fn compose(
        &self,
        ticket: &ScoredTicket,
        snippets: &[KnowledgeSnippet],
    ) -> Result<Suggestion, GenerationError> {
        if !self.generator.is_available() {
            return Err(GenerationError::Unavailable);
        }

        let request = CompletionRequest::new(build_prompt(ticket, snippets), self.temperature)
            .with_system(SYSTEM_PROMPT)
            .json();

        debug!("Requesting advice for {}", ticket.ticket.ticket_id);
        let reply = self.generator.complete(&request).await?;
        parse_suggestion(ticket, &reply)
    }
}
