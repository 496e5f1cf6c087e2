//! Draw storage with SQLite
//!
//! A [`DrawStore`] owns one connection and one game table. Writes are
//! insert-only: a draw that is already stored is skipped or counted as a
//! duplicate, never updated.

mod schema;

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::draw::{Combination, DrawRecord};
use crate::error::{Error, Result};
use crate::game::GameSchema;

pub use schema::{ball_columns, table_ddl};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Ids per `IN (...)` lookup, well under SQLite's bound parameter limit
const LOOKUP_CHUNK: usize = 500;

/// Outcome of one [`DrawStore::insert_batch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: usize,
    /// Rejected by the uniqueness constraint at insert time
    pub duplicate: usize,
    /// Already stored, filtered out before inserting
    pub skipped: usize,
    /// Failed schema validation
    pub invalid: usize,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl InsertReport {
    pub fn is_clean(&self) -> bool {
        self.failed_chunks.is_empty()
    }
}

/// A chunk that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    pub first_issue: String,
    pub last_issue: String,
    pub rows: usize,
    pub error: String,
}

pub struct DrawStore {
    conn: Connection,
    schema: GameSchema,
    table: String,
    columns: Vec<String>,
    batch_size: usize,
}

impl DrawStore {
    pub fn open(path: &Path, schema: GameSchema) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn, schema)
    }

    pub fn open_in_memory(schema: GameSchema) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, schema)
    }

    fn with_connection(conn: Connection, schema: GameSchema) -> Result<Self> {
        let store = Self {
            conn,
            table: schema.table_name(),
            columns: ball_columns(&schema),
            schema,
            batch_size: DEFAULT_BATCH_SIZE,
        };
        store.create_schema()?;
        Ok(store)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn schema(&self) -> &GameSchema {
        &self.schema
    }

    pub fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(&table_ddl(&self.schema))?;
        Ok(())
    }

    // ============================================
    // WRITES
    // ============================================

    /// Insert `records`, oldest issue first, one transaction per chunk.
    ///
    /// With `skip_existing`, ids already present are filtered out up front and
    /// counted as `skipped`. A chunk that fails for any reason other than a
    /// uniqueness conflict is rolled back on its own; earlier chunks stay
    /// committed.
    pub fn insert_batch(
        &mut self,
        records: &[DrawRecord],
        skip_existing: bool,
    ) -> Result<InsertReport> {
        let mut report = InsertReport::default();

        let mut pending: Vec<&DrawRecord> = Vec::with_capacity(records.len());
        for record in records {
            if issue_key(&record.issue_id).is_none() {
                debug!(game = %self.schema.id, issue = %record.issue_id, "non-numeric issue");
                report.invalid += 1;
                continue;
            }
            match self.schema.check_structure(&record.numbers) {
                Ok(()) => pending.push(record),
                Err(reason) => {
                    debug!(
                        game = %self.schema.id,
                        issue = %record.issue_id,
                        %reason,
                        "invalid record"
                    );
                    report.invalid += 1;
                }
            }
        }
        pending.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));

        if skip_existing && !pending.is_empty() {
            let ids: Vec<String> = pending.iter().map(|r| r.issue_id.clone()).collect();
            let existing = self.existing_ids(&ids)?;
            let before = pending.len();
            pending.retain(|r| !existing.contains(&r.issue_id));
            report.skipped = before - pending.len();
        }

        for chunk in pending.chunks(self.batch_size) {
            match self.insert_chunk(chunk) {
                Ok((inserted, duplicate)) => {
                    report.inserted += inserted;
                    report.duplicate += duplicate;
                }
                Err(err) => {
                    let failure = ChunkFailure {
                        first_issue: chunk[0].issue_id.clone(),
                        last_issue: chunk[chunk.len() - 1].issue_id.clone(),
                        rows: chunk.len(),
                        error: err.to_string(),
                    };
                    warn!(
                        game = %self.schema.id,
                        first = %failure.first_issue,
                        last = %failure.last_issue,
                        error = %failure.error,
                        "chunk rolled back"
                    );
                    report.failed_chunks.push(failure);
                }
            }
        }

        debug!(game = %self.schema.id, ?report, "insert finished");
        Ok(report)
    }

    fn insert_chunk(&mut self, chunk: &[&DrawRecord]) -> rusqlite::Result<(usize, usize)> {
        let sql = format!(
            "INSERT INTO {} (id, issue_id, draw_date, {}, sorted_code) VALUES ({})",
            self.table,
            self.columns.join(", "),
            repeat_vars(self.columns.len() + 4),
        );

        let tx = self.conn.transaction()?;
        let (mut inserted, mut duplicate) = (0, 0);
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in chunk {
                let mut values = Vec::with_capacity(self.columns.len() + 4);
                values.push(Value::Integer(issue_key(&record.issue_id).unwrap_or_default()));
                values.push(Value::Text(record.issue_id.clone()));
                values.push(Value::Text(record.draw_date.to_string()));
                values.extend(record.numbers.flatten().map(|v| Value::Integer(i64::from(v))));
                values.push(Value::Text(record.numbers.sorted_code()));

                match stmt.execute(params_from_iter(values)) {
                    Ok(_) => inserted += 1,
                    Err(err) if is_unique_violation(&err) => {
                        debug!(game = %self.schema.id, issue = %record.issue_id, "duplicate issue");
                        duplicate += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        tx.commit()?;
        Ok((inserted, duplicate))
    }

    // ============================================
    // QUERIES
    // ============================================

    /// Most recent stored draw.
    pub fn latest(&self) -> Result<Option<DrawRecord>> {
        Ok(self.all(Some(1))?.into_iter().next())
    }

    /// Stored draws, newest first.
    pub fn all(&self, limit: Option<usize>) -> Result<Vec<DrawRecord>> {
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT issue_id, draw_date, {} FROM {}
             ORDER BY draw_date DESC, issue_id DESC
             LIMIT ?",
            self.columns.join(", "),
            self.table,
        ))?;

        let mut rows = stmt.query(params![limit])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(self.decode(row)?);
        }
        Ok(records)
    }

    /// Which of `ids` are already stored.
    pub fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let mut found = HashSet::new();
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT issue_id FROM {} WHERE issue_id IN ({})",
                self.table,
                repeat_vars(chunk.len()),
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk), |row| row.get::<_, String>(0))?;
            for id in rows {
                found.insert(id?);
            }
        }
        Ok(found)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn decode(&self, row: &rusqlite::Row) -> Result<DrawRecord> {
        let issue_id: String = row.get(0)?;
        let date: String = row.get(1)?;
        let corrupt = |reason: String| Error::CorruptRow {
            issue_id: issue_id.clone(),
            reason,
        };

        let draw_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("draw_date {date:?}: {e}")))?;

        let mut column = 2;
        let mut groups = Vec::with_capacity(self.schema.groups.len());
        for group in self.schema.groups {
            let mut values = Vec::with_capacity(group.count);
            for _ in 0..group.count {
                let raw: i64 = row.get(column)?;
                let value = u8::try_from(raw)
                    .map_err(|_| corrupt(format!("{} = {raw}", self.columns[column - 2])))?;
                values.push(value);
                column += 1;
            }
            groups.push(values);
        }

        Ok(DrawRecord {
            issue_id: issue_id.clone(),
            draw_date,
            numbers: Combination::new(groups),
        })
    }
}

/// Row id of an issue: the issue number itself, so rows sort by issue no
/// matter which batch brought them in.
fn issue_key(issue_id: &str) -> Option<i64> {
    if issue_id.is_empty() || !issue_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    issue_id.parse().ok()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn repeat_vars(count: usize) -> String {
    vec!["?"; count].join(", ")
}
