//! Typed failures raised by the ingestion pipeline.
//!
//! Every stage reports one of these instead of printing; the command handlers
//! decide whether to show, log, or abort.

use std::fmt;

use thiserror::Error;

pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// A single value that failed a shape check and needs correcting at the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIssue {
    /// 1-based data row (header excluded).
    pub row: usize,
    pub column: String,
    pub value: String,
    pub expected: &'static str,
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value '{}' at row {} in the column '{}' is not in the form of '{}'",
            self.value, self.row, self.column, self.expected
        )
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Database connection failed for {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Query failed while {action}: {source}")]
    Query {
        action: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Unable to read '{name}': {reason}")]
    Parse { name: String, reason: String },
    #[error("Column '{column}' is missing in the uploaded file")]
    MissingColumn { column: String },
    #[error("{}", render_issues(.issues))]
    DataQuality { issues: Vec<DataIssue> },
    #[error("Error fetching file from {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Failed to compute derived column '{column}': {reason}")]
    Derive { column: String, reason: String },
    #[error("{0}")]
    Input(String),
    #[error("{0}")]
    Resolve(String),
}

impl IngestError {
    pub(crate) fn query(action: impl Into<String>, source: rusqlite::Error) -> Self {
        IngestError::Query {
            action: action.into(),
            source,
        }
    }

    pub(crate) fn parse(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        IngestError::Parse {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

fn render_issues(issues: &[DataIssue]) -> String {
    let mut lines = vec![format!(
        "Found {} inconsistent value(s); change them and re-upload",
        issues.len()
    )];
    lines.extend(issues.iter().map(|issue| format!("  - {issue}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_quality_message_lists_every_issue() {
        let err = IngestError::DataQuality {
            issues: vec![
                DataIssue {
                    row: 2,
                    column: "eMonth".into(),
                    value: "soon".into(),
                    expected: "MMM-YY",
                },
                DataIssue {
                    row: 5,
                    column: "eMonth".into(),
                    value: "??".into(),
                    expected: "MMM-YY",
                },
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("Found 2 inconsistent value(s)"));
        assert!(message.contains("Value 'soon' at row 2 in the column 'eMonth'"));
        assert!(message.contains("'??' at row 5"));
    }
}
