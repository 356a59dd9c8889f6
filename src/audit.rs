//! Append-only run log.
//!
//! Every pipeline invocation records one [`RunEntry`]. The sink is injected
//! so tests can observe entries without a database.

use crate::models::RunEntry;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Destination for run entries.
pub trait RunLog: Send + Sync {
    fn record(&self, entry: &RunEntry) -> Result<()>;
}

/// Discards every entry; used when auditing is disabled.
pub struct NullRunLog;

impl RunLog for NullRunLog {
    fn record(&self, _entry: &RunEntry) -> Result<()> {
        Ok(())
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS ai_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    model TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    status TEXT NOT NULL
);";

/// SQLite-backed run log, one row per entry in `ai_runs`.
pub struct SqliteRunLog {
    conn: Mutex<Connection>,
}

impl SqliteRunLog {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open run log {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory database.
    #[allow(dead_code)] // Used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("Failed to open in-memory run log")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create ai_runs table")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RunLog for SqliteRunLog {
    fn record(&self, entry: &RunEntry) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("run log lock poisoned"))?;

        conn.execute(
            "INSERT INTO ai_runs (ts, endpoint, model, latency_ms, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.endpoint,
                entry.model,
                entry.latency_ms as i64,
                entry.status
            ],
        )
        .context("Failed to insert run entry")?;

        debug!("Recorded {} run ({})", entry.endpoint, entry.status);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(endpoint: &str, status: &str) -> RunEntry {
        RunEntry {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            model: "llama3.2:latest".to_string(),
            latency_ms: 42,
            status: status.to_string(),
        }
    }

    fn rows(log: &SqliteRunLog) -> Vec<(String, String, i64)> {
        let conn = log.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT endpoint, status, latency_ms FROM ai_runs ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        rows
    }

    #[test]
    fn test_in_memory_records() {
        let log = SqliteRunLog::open_in_memory().unwrap();
        log.record(&entry("summarize", "OK")).unwrap();
        log.record(&entry("analyze", "ERROR")).unwrap();

        assert_eq!(
            rows(&log),
            vec![
                ("summarize".to_string(), "OK".to_string(), 42),
                ("analyze".to_string(), "ERROR".to_string(), 42),
            ]
        );
    }

    #[test]
    fn test_file_log_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("ai_monitor.db");

        SqliteRunLog::open(&path)
            .unwrap()
            .record(&entry("reindex", "OK"))
            .unwrap();

        let reopened = SqliteRunLog::open(&path).unwrap();
        reopened.record(&entry("summarize", "OK")).unwrap();
        assert_eq!(rows(&reopened).len(), 2);
    }

    #[test]
    fn test_null_log_accepts_everything() {
        assert!(NullRunLog.record(&entry("health", "OK")).is_ok());
    }
}
