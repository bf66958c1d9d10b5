//! SQLite audit store implementation.

use std::path::Path;

use chrono::SecondsFormat;
use rusqlite::{Connection, Row, params};

use crate::{AuditRecord, Error, Result};

/// SQLite-backed audit store.
pub struct AuditStore {
    conn: Connection,
}

/// Totals over the whole trail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditCounts {
    pub allowed: u64,
    pub denied: u64,
}

type RawRecord = (String, String, String, String, String, String, bool, String);

const SELECT: &str = "SELECT id, timestamp, subject_id, collection, document_id, operation, allowed, reason
     FROM decisions";

impl AuditStore {
    /// Open or create an audit store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory audit store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                collection TEXT NOT NULL,
                document_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                allowed INTEGER NOT NULL,
                reason TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_decisions_time
                ON decisions(timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append a record.
    pub fn record(&self, record: &AuditRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO decisions (id, timestamp, subject_id, collection, document_id, operation, allowed, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                record.subject_id,
                record.collection,
                record.document_id,
                record.operation.as_str(),
                record.allowed,
                record.reason,
            ],
        )?;
        Ok(())
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.query(
            &format!("{SELECT} ORDER BY timestamp DESC, rowid DESC LIMIT ?1"),
            limit,
        )
    }

    /// Most recent denials first.
    pub fn denials(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        self.query(
            &format!("{SELECT} WHERE allowed = 0 ORDER BY timestamp DESC, rowid DESC LIMIT ?1"),
            limit,
        )
    }

    pub fn counts(&self) -> Result<AuditCounts> {
        let (allowed, denied) = self.conn.query_row(
            "SELECT COALESCE(SUM(allowed), 0), COALESCE(SUM(1 - allowed), 0) FROM decisions",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;
        Ok(AuditCounts {
            allowed: allowed as u64,
            denied: denied as u64,
        })
    }

    fn query(&self, sql: &str, limit: usize) -> Result<Vec<AuditRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([limit as i64], raw_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(parse_record).collect()
    }
}

fn raw_record(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn parse_record(raw: RawRecord) -> Result<AuditRecord> {
    let (id, timestamp, subject_id, collection, document_id, operation, allowed, reason) = raw;
    let corrupt = |detail: String| Error::Corrupt {
        id: id.clone(),
        detail,
    };

    Ok(AuditRecord {
        id: id.parse().map_err(|e| corrupt(format!("id: {e}")))?,
        timestamp: timestamp
            .parse()
            .map_err(|e| corrupt(format!("timestamp: {e}")))?,
        operation: operation.parse().map_err(|e| corrupt(format!("{e}")))?,
        subject_id,
        collection,
        document_id,
        allowed,
        reason,
    })
}
