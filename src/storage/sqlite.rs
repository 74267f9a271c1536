//! SQLite persistence for review records.
//!
//! One table, append-only. Lists are stored as JSON text and the creation
//! timestamp is a fixed-width UTC string so it sorts lexicographically.

use crate::review::ReviewFields;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Number of records returned by [`ReviewStore::recent`] at the API boundary
pub const RECENT_LIMIT: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A stored review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub id: String,
    pub filename: String,
    #[serde(flatten)]
    pub fields: ReviewFields,
    pub created_at: DateTime<Utc>,
}

/// Review table behind a `Mutex<Connection>`.
///
/// `rusqlite::Connection` is not `Sync`; async callers go through
/// `tokio::task::spawn_blocking`.
pub struct ReviewStore {
    conn: Mutex<Connection>,
}

impl ReviewStore {
    /// Open or create the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {:?}", path))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                readability_score REAL NOT NULL,
                modularity_score REAL NOT NULL,
                potential_issues TEXT NOT NULL,
                suggestions TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reviews_created_at ON reviews (created_at);",
        )
        .context("Failed to initialize review schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("review store lock poisoned"))
    }

    /// Insert a new record, assigning its id and creation time.
    pub fn append(&self, filename: &str, fields: ReviewFields) -> Result<ReviewRecord> {
        let record = ReviewRecord {
            id: Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            fields,
            created_at: Utc::now(),
        };

        let issues = serde_json::to_string(&record.fields.potential_issues)?;
        let suggestions = serde_json::to_string(&record.fields.suggestions)?;

        self.lock()?
            .execute(
                "INSERT INTO reviews
                    (id, filename, readability_score, modularity_score, potential_issues, suggestions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.filename,
                    record.fields.readability_score,
                    record.fields.modularity_score,
                    issues,
                    suggestions,
                    record.created_at.format(TIMESTAMP_FORMAT).to_string(),
                ],
            )
            .with_context(|| format!("Failed to insert review for {}", filename))?;

        debug!(id = %record.id, filename = %record.filename, "Stored review");
        Ok(record)
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ReviewRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, filename, readability_score, modularity_score, potential_issues, suggestions, created_at
             FROM reviews
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], RawRow::from_row)?;
        let records = rows
            .map(|raw| raw.map_err(anyhow::Error::from).and_then(RawRow::into_record))
            .collect::<Result<Vec<_>>>()?;

        info!(count = records.len(), "Loaded recent reviews");
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let total: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(total as usize)
    }
}

#[cfg(test)]
impl ReviewStore {
    /// Drop the review table so every later query fails.
    pub fn drop_schema(&self) -> Result<()> {
        self.lock()?.execute_batch("DROP TABLE reviews;")?;
        Ok(())
    }
}

struct RawRow {
    id: String,
    filename: String,
    readability_score: f64,
    modularity_score: f64,
    potential_issues: String,
    suggestions: String,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            filename: row.get(1)?,
            readability_score: row.get(2)?,
            modularity_score: row.get(3)?,
            potential_issues: row.get(4)?,
            suggestions: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<ReviewRecord> {
        let created_at = NaiveDateTime::parse_from_str(&self.created_at, TIMESTAMP_FORMAT)
            .with_context(|| format!("Invalid created_at for review {}", self.id))?
            .and_utc();

        Ok(ReviewRecord {
            fields: ReviewFields {
                readability_score: self.readability_score,
                modularity_score: self.modularity_score,
                potential_issues: serde_json::from_str(&self.potential_issues)
                    .with_context(|| format!("Invalid potential_issues for review {}", self.id))?,
                suggestions: serde_json::from_str(&self.suggestions)
                    .with_context(|| format!("Invalid suggestions for review {}", self.id))?,
            },
            id: self.id,
            filename: self.filename,
            created_at,
        })
    }
}
