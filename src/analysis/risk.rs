//! Ticket risk scoring and ranking.
//!
//! The score combines priority weight and due-date proximity. Overdue
//! tickets are always Critical, regardless of the score thresholds used
//! for the other buckets.

use crate::models::{RiskBucket, ScoredTicket, Ticket};
use std::cmp::Ordering;

/// Map days-to-due onto the proximity component of the score.
///
/// > 21 days: 0 (safe), 8-21: 1 (near), 0-7: 2 (urgent), overdue: 3.
pub fn days_component(days_to_due: i64) -> i64 {
    if days_to_due > 21 {
        0
    } else if days_to_due > 7 {
        1
    } else if days_to_due >= 0 {
        2
    } else {
        3
    }
}

/// Bucket a score. An overdue component short-circuits to Critical.
pub fn bucket_for(score: i64, days_component: i64) -> RiskBucket {
    if days_component == 3 {
        RiskBucket::Critical
    } else if score >= 7 {
        RiskBucket::High
    } else if score >= 4 {
        RiskBucket::Medium
    } else {
        RiskBucket::Low
    }
}

/// Score a single ticket. Total: missing fields fall back to defaults.
pub fn score(ticket: &Ticket) -> ScoredTicket {
    let days = ticket.effective_days_to_due();
    let component = days_component(days);
    let risk_score = ticket.priority.weight() * 2 + component * 3;

    let mut ticket = ticket.clone();
    ticket.days_to_due = Some(days);

    ScoredTicket {
        ticket,
        risk_score,
        risk_bucket: bucket_for(risk_score, component),
    }
}

/// Critical first, then higher score first.
fn ranking(a: &ScoredTicket, b: &ScoredTicket) -> Ordering {
    b.is_critical()
        .cmp(&a.is_critical())
        .then_with(|| b.risk_score.cmp(&a.risk_score))
}

/// Sort scored tickets by the ranking rule. Stable: ties keep input order.
pub fn rank(scored: &mut [ScoredTicket]) {
    scored.sort_by(ranking);
}

/// Score every ticket and return them ranked.
pub fn score_all(tickets: &[Ticket]) -> Vec<ScoredTicket> {
    let mut scored: Vec<ScoredTicket> = tickets.iter().map(score).collect();
    rank(&mut scored);
    scored
}

/// The `n` highest-ranked tickets, without assuming the input is ranked.
pub fn top_n(scored: &[ScoredTicket], n: usize) -> Vec<ScoredTicket> {
    let mut ranked = scored.to_vec();
    rank(&mut ranked);
    ranked.truncate(n);
    ranked
}
