//! Interactive resolution of columns the reconciler could not match.
//!
//! Every unmatched column starts `Pending`. Choosing a canonical name moves it
//! to `Resolved` and removes that name from the options offered for the
//! remaining columns. A blank answer leaves the column pending.

use serde::Serialize;

use crate::{
    error::{IngestError, IngestResult},
    reconcile::Reconciliation,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "canonical", rename_all = "snake_case")]
pub enum ColumnState {
    Pending,
    Resolved(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedColumn {
    pub original: String,
    pub state: ColumnState,
}

/// What to show the user for one pending column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub column: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { original: String, canonical: String },
    Pending { original: String },
}

#[derive(Debug, Clone, Default)]
pub struct MappingResolver {
    columns: Vec<UnmatchedColumn>,
    /// Canonical names available at the start, in offer order.
    pool: Vec<String>,
}

impl MappingResolver {
    pub fn new(unmatched: Vec<String>, pool: Vec<String>) -> Self {
        MappingResolver {
            columns: unmatched
                .into_iter()
                .map(|original| UnmatchedColumn {
                    original,
                    state: ColumnState::Pending,
                })
                .collect(),
            pool,
        }
    }

    pub fn from_reconciliation(outcome: &Reconciliation) -> Self {
        MappingResolver::new(outcome.unmatched.clone(), outcome.unclaimed.clone())
    }

    pub fn columns(&self) -> &[UnmatchedColumn] {
        &self.columns
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|column| column.state == ColumnState::Pending)
            .map(|column| column.original.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Pool names not yet chosen for any column.
    pub fn options(&self) -> Vec<String> {
        self.pool
            .iter()
            .filter(|name| !self.is_claimed(name))
            .cloned()
            .collect()
    }

    pub fn prompt_for(&self, column: &str) -> IngestResult<Prompt> {
        let entry = self.find(column)?;
        if let ColumnState::Resolved(canonical) = &entry.state {
            return Err(IngestError::Resolve(format!(
                "Column '{column}' is already mapped to '{canonical}'"
            )));
        }
        Ok(Prompt {
            column: entry.original.clone(),
            options: self.options(),
        })
    }

    pub fn resolve(&mut self, column: &str, selection: Option<&str>) -> IngestResult<Resolution> {
        let selection = selection.map(str::trim).filter(|s| !s.is_empty());
        let prompt = self.prompt_for(column)?;
        let Some(selection) = selection else {
            return Ok(Resolution::Pending {
                original: prompt.column,
            });
        };
        if !prompt.options.iter().any(|option| option == selection) {
            return Err(IngestError::Resolve(format!(
                "'{selection}' is not an available option for column '{column}'"
            )));
        }
        if let Some(entry) = self
            .columns
            .iter_mut()
            .find(|entry| entry.original == column)
        {
            entry.state = ColumnState::Resolved(selection.to_string());
        }
        Ok(Resolution::Resolved {
            original: prompt.column,
            canonical: selection.to_string(),
        })
    }

    fn find(&self, column: &str) -> IngestResult<&UnmatchedColumn> {
        self.columns
            .iter()
            .find(|entry| entry.original == column)
            .ok_or_else(|| {
                IngestError::Resolve(format!("Column '{column}' is not awaiting a mapping"))
            })
    }

    fn is_claimed(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|column| matches!(&column.state, ColumnState::Resolved(chosen) if chosen == name))
    }
}
