//! Loading a prepared table into the destination database.

use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Value};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::{
    data::Cell,
    error::{IngestError, IngestResult},
    grid::UploadedTable,
    store::quote_identifier,
};

#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Fail when the table already exists.
    #[default]
    Create,
    /// Add rows to an existing table.
    Append,
    /// Drop any existing table and recreate it.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LoadSummary {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
    pub mode: LoadMode,
    pub created: bool,
}

/// Narrowest column type that holds every non-empty cell.
pub fn infer_column_type<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> SqlType {
    let mut inferred = SqlType::Integer;
    for cell in cells {
        match cell {
            Cell::Empty => {}
            Cell::Text(s) if s.trim().is_empty() => {}
            Cell::Integer(_) | Cell::Boolean(_) => {}
            Cell::Float(_) | Cell::Decimal(_) => inferred = SqlType::Real,
            Cell::Text(_) | Cell::DateTime(_) => return SqlType::Text,
        }
    }
    inferred
}

pub fn table_exists(conn: &Connection, name: &str) -> IngestResult<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|err| IngestError::query("checking for the destination table", err))
}

fn existing_columns(conn: &Connection, name: &str) -> IngestResult<Vec<String>> {
    let failed = |err| IngestError::query("reading destination columns", err);
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_identifier(name)))
        .map_err(failed)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(failed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(failed)?;
    Ok(columns)
}

/// Writes every row of `table` into `name` inside one transaction.
pub fn load_table(
    conn: &mut Connection,
    name: &str,
    table: &UploadedTable,
    mode: LoadMode,
) -> IngestResult<LoadSummary> {
    let exists = table_exists(conn, name)?;
    match (mode, exists) {
        (LoadMode::Create, true) => {
            return Err(IngestError::Input(format!(
                "Table '{name}' already exists; use --mode append or --mode replace"
            )));
        }
        (LoadMode::Append, false) => {
            return Err(IngestError::Input(format!(
                "Table '{name}' does not exist; use --mode create first"
            )));
        }
        (LoadMode::Append, true) => {
            let known = existing_columns(conn, name)?;
            let unknown: Vec<&str> = table
                .headers()
                .iter()
                .filter(|header| !known.contains(header))
                .map(String::as_str)
                .collect();
            if !unknown.is_empty() {
                return Err(IngestError::Input(format!(
                    "Table '{name}' has no column(s): {}",
                    unknown.join(", ")
                )));
            }
        }
        _ => {}
    }

    let failed = |err| IngestError::query(format!("loading rows into '{name}'"), err);
    let tx = conn.transaction().map_err(failed)?;
    let quoted = quote_identifier(name);
    if mode == LoadMode::Replace && exists {
        debug!("Dropping existing table '{name}'");
        tx.execute_batch(&format!("DROP TABLE {quoted}"))
            .map_err(failed)?;
    }
    let created = mode != LoadMode::Append;
    if created {
        tx.execute_batch(&create_table_sql(&quoted, table))
            .map_err(failed)?;
    }
    {
        let columns = table
            .headers()
            .iter()
            .map(|header| quote_identifier(header))
            .join(", ");
        let placeholders = (1..=table.column_count())
            .map(|idx| format!("?{idx}"))
            .join(", ");
        let mut insert = tx
            .prepare(&format!(
                "INSERT INTO {quoted} ({columns}) VALUES ({placeholders})"
            ))
            .map_err(failed)?;
        for row in table.rows() {
            insert
                .execute(params_from_iter(row.iter().map(sql_value)))
                .map_err(failed)?;
        }
    }
    tx.commit().map_err(failed)?;
    info!(
        "Loaded {} row(s) into '{name}' ({mode:?})",
        table.row_count()
    );
    Ok(LoadSummary {
        table: name.to_string(),
        rows: table.row_count(),
        columns: table.column_count(),
        mode,
        created,
    })
}

fn create_table_sql(quoted_name: &str, table: &UploadedTable) -> String {
    let columns = table
        .headers()
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let sql_type = infer_column_type(table.rows().iter().filter_map(|row| row.get(idx)));
            format!("{} {}", quote_identifier(header), sql_type.as_sql())
        })
        .join(", ");
    format!("CREATE TABLE {quoted_name} ({columns})")
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Empty => Value::Null,
        Cell::Text(s) if s.trim().is_empty() => Value::Null,
        Cell::Text(s) => Value::Text(s.clone()),
        Cell::Integer(i) => Value::Integer(*i),
        Cell::Float(f) => Value::Real(*f),
        Cell::Decimal(d) => d
            .to_f64()
            .map(Value::Real)
            .unwrap_or_else(|| Value::Text(d.to_string())),
        Cell::Boolean(b) => Value::Integer(i64::from(*b)),
        Cell::DateTime(_) => Value::Text(cell.as_display()),
    }
}
