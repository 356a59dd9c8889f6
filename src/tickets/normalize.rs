//! Field-casing normalization for ticket records.
//!
//! The ticketing API serializes records either in camelCase or in
//! PascalCase. A fixed table lists both spellings of every canonical field;
//! the first non-null spelling wins.

use crate::models::{Priority, Ticket};
use serde_json::{Map, Value};
use tracing::warn;

/// (canonical camelCase key, PascalCase alias)
const FIELD_TABLE: &[(&str, &str)] = &[
    ("ticketId", "TicketId"),
    ("dcId", "DcId"),
    ("docCategory", "DocCategory"),
    ("owner", "Owner"),
    ("status", "Status"),
    ("priority", "Priority"),
    ("createdAt", "CreatedAt"),
    ("dueDate", "DueDate"),
    ("daysToDue", "DaysToDue"),
];

const UNCATEGORIZED: &str = "Uncategorized";

fn lookup<'a>(record: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
    let alias = FIELD_TABLE
        .iter()
        .find(|(key, _)| *key == canonical)
        .map(|(_, alias)| *alias)?;

    [canonical, alias]
        .into_iter()
        .filter_map(|key| record.get(key))
        .find(|v| !v.is_null())
}

fn text(record: &Map<String, Value>, canonical: &str) -> Option<String> {
    let value = lookup(record, canonical)?;
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn integer(record: &Map<String, Value>, canonical: &str) -> Option<i64> {
    match lookup(record, canonical)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map one raw record onto a [`Ticket`].
///
/// Returns `None` when the record is not an object or lacks a ticket id
/// or data-center id.
pub fn normalize_record(raw: &Value) -> Option<Ticket> {
    let record = raw.as_object()?;

    let ticket_id = text(record, "ticketId")?;
    let dc_id = text(record, "dcId")?;

    Some(Ticket {
        ticket_id,
        dc_id,
        doc_category: text(record, "docCategory").unwrap_or_else(|| UNCATEGORIZED.to_string()),
        owner: text(record, "owner"),
        status: text(record, "status"),
        priority: text(record, "priority")
            .map(|p| Priority::parse_lenient(&p))
            .unwrap_or_default(),
        created_at: text(record, "createdAt"),
        due_date: text(record, "dueDate"),
        days_to_due: integer(record, "daysToDue"),
    })
}

/// Normalize a batch, dropping records that cannot form a ticket.
pub fn normalize_records(raw: &[Value]) -> Vec<Ticket> {
    raw.iter()
        .enumerate()
        .filter_map(|(i, record)| {
            let ticket = normalize_record(record);
            if ticket.is_none() {
                warn!("Dropping ticket record #{}: missing ticket id or data-center id", i);
            }
            ticket
        })
        .collect()
}
