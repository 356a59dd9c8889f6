//! Due-date counters and bucket statistics.
//!
//! Mirrors the dashboard KPIs: open tickets, due within 7 and 21 days,
//! and overdue.

use crate::models::{KpiSummary, RiskBucket, ScoredTicket, Ticket};
use std::collections::BTreeMap;

fn is_open(ticket: &Ticket) -> bool {
    match ticket.status.as_deref() {
        Some(status) => status.eq_ignore_ascii_case("open"),
        None => true,
    }
}

/// Compute the KPI counters over a ticket set.
///
/// Tickets without a status count as open. Tickets without a due date
/// only contribute to `open`.
pub fn kpi_summary<'a, I>(tickets: I) -> KpiSummary
where
    I: IntoIterator<Item = &'a Ticket>,
{
    let mut kpi = KpiSummary::default();

    for ticket in tickets.into_iter().filter(|t| is_open(t)) {
        kpi.open += 1;

        if let Some(days) = ticket.days_to_due {
            if days < 0 {
                kpi.overdue += 1;
            } else {
                if days <= 21 {
                    kpi.due_in21 += 1;
                }
                if days <= 7 {
                    kpi.due_in7 += 1;
                }
            }
        }
    }

    kpi
}

/// Count scored tickets per bucket.
pub fn bucket_counts(scored: &[ScoredTicket]) -> BTreeMap<RiskBucket, usize> {
    let mut counts = BTreeMap::new();
    for s in scored {
        *counts.entry(s.risk_bucket).or_insert(0) += 1;
    }
    counts
}
