//! Local rule hints, computed without any backend.

use crate::models::{Priority, ScoredTicket};

pub const HINT_OVERDUE: &str = "Overdue: escalate to DC manager and schedule daily check-ins.";
pub const HINT_DUE_7: &str = "Due ≤7d: assign backup owner and block a repair window.";
pub const HINT_DUE_21: &str = "Due ≤21d: confirm dependencies and order parts now.";
pub const HINT_HIGH_PRIORITY: &str = "High priority: page on-call and notify stakeholders.";

/// Steps used to pad a rule-only suggestion up to three actions.
pub const PAD_STEPS: [&str; 3] = [
    "Confirm owner and next checkpoint on the ticket",
    "Review the category runbook for known fixes",
    "Update the ticket with findings before end of day",
];

/// Hints for a ticket: at most one due-date hint, plus the priority hint.
pub fn rule_hints(ticket: &ScoredTicket) -> Vec<&'static str> {
    let mut hints = Vec::with_capacity(2);
    let days = ticket.days_to_due();

    if days < 0 {
        hints.push(HINT_OVERDUE);
    } else if days <= 7 {
        hints.push(HINT_DUE_7);
    } else if days <= 21 {
        hints.push(HINT_DUE_21);
    }

    if ticket.ticket.priority == Priority::High {
        hints.push(HINT_HIGH_PRIORITY);
    }

    hints
}
