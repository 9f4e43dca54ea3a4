//! Persistent column mappings backed by SQLite.
//!
//! One row per report column name. Re-saving a known name overwrites its
//! canonical target; the summary tells callers whether anything new was
//! learned.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::error::{IngestError, IngestResult};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredMapping {
    pub report_column: String,
    pub required_column: String,
    pub excel_format: Option<String>,
    pub insert_ts: String,
    pub updated_ts: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct UpsertSummary {
    pub created: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn any_created(&self) -> bool {
        self.created > 0
    }

    pub fn message(&self) -> &'static str {
        if self.any_created() {
            "New column mappings have been added"
        } else {
            "No new column mappings were added. Existing mappings were updated."
        }
    }
}

pub struct MappingStore {
    conn: Connection,
    table: String,
}

impl MappingStore {
    pub fn open(path: &Path, table: &str) -> IngestResult<Self> {
        let conn = Connection::open(path).map_err(|source| IngestError::Connection {
            target: path.display().to_string(),
            source,
        })?;
        debug!("Opened mapping store {path:?}");
        MappingStore::with_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> IngestResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| IngestError::Connection {
            target: ":memory:".to_string(),
            source,
        })?;
        MappingStore::with_connection(conn, table)
    }

    fn with_connection(conn: Connection, table: &str) -> IngestResult<Self> {
        let store = MappingStore {
            conn,
            table: table.to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> IngestResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                report_column TEXT PRIMARY KEY,
                required_column TEXT NOT NULL,
                excel_format TEXT,
                insert_ts TEXT NOT NULL,
                updated_ts TEXT NOT NULL
            )",
            quote_identifier(&self.table)
        );
        self.conn
            .execute_batch(&sql)
            .map_err(|err| IngestError::query("creating the mapping table", err))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Every stored row in insertion order.
    pub fn fetch(&self) -> IngestResult<Vec<StoredMapping>> {
        let sql = format!(
            "SELECT report_column, required_column, excel_format, insert_ts, updated_ts
             FROM {} ORDER BY rowid",
            quote_identifier(&self.table)
        );
        let failed = |err| IngestError::query("reading column mappings", err);
        let mut stmt = self.conn.prepare(&sql).map_err(failed)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredMapping {
                    report_column: row.get(0)?,
                    required_column: row.get(1)?,
                    excel_format: row.get(2)?,
                    insert_ts: row.get(3)?,
                    updated_ts: row.get(4)?,
                })
            })
            .map_err(failed)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(failed)
    }

    /// `(report column, canonical)` pairs in insertion order.
    pub fn pairs(&self) -> IngestResult<Vec<(String, String)>> {
        Ok(self
            .fetch()?
            .into_iter()
            .map(|row| (row.report_column, row.required_column))
            .collect())
    }

    /// Inserts or overwrites every pair in one transaction.
    pub fn upsert(
        &mut self,
        pairs: &[(String, String)],
        excel_format: Option<&str>,
    ) -> IngestResult<UpsertSummary> {
        let table = quote_identifier(&self.table);
        let exists_sql = format!("SELECT 1 FROM {table} WHERE report_column = ?1");
        let upsert_sql = format!(
            "INSERT INTO {table} (report_column, required_column, excel_format, insert_ts, updated_ts)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(report_column) DO UPDATE SET
                required_column = excluded.required_column,
                excel_format = COALESCE(excluded.excel_format, excel_format),
                updated_ts = excluded.updated_ts"
        );
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let failed = |err| IngestError::query("saving column mappings", err);

        let tx = self.conn.transaction().map_err(failed)?;
        let mut summary = UpsertSummary::default();
        {
            let mut exists = tx.prepare(&exists_sql).map_err(failed)?;
            let mut upsert = tx.prepare(&upsert_sql).map_err(failed)?;
            for (report_column, canonical) in pairs {
                let known = exists
                    .query_row(params![report_column], |_| Ok(()))
                    .optional()
                    .map_err(failed)?
                    .is_some();
                upsert
                    .execute(params![report_column, canonical, excel_format, now])
                    .map_err(failed)?;
                if known {
                    summary.updated += 1;
                } else {
                    summary.created += 1;
                }
            }
        }
        tx.commit().map_err(failed)?;
        info!(
            "Saved {} mapping(s) to '{}' ({} new, {} updated)",
            pairs.len(),
            self.table,
            summary.created,
            summary.updated
        );
        Ok(summary)
    }

    /// Deletes one stored mapping. Returns `false` when it was not present.
    pub fn remove(&self, report_column: &str) -> IngestResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE report_column = ?1",
            quote_identifier(&self.table)
        );
        let removed = self
            .conn
            .execute(&sql, params![report_column])
            .map_err(|err| IngestError::query("removing a column mapping", err))?;
        Ok(removed > 0)
    }
}

/// Double-quotes an SQL identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
