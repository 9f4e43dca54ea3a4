//! Cleanup and derivation applied to a fully mapped table before loading.

use log::{debug, info};

use crate::{
    config::{CleanupKind, CleanupRule, Config},
    data::{
        Cell, normalize_column_name, normalize_year_month, parse_amount, parse_count,
        sanitize_table_name, strip_segment_marker,
    },
    derive::DerivedColumn,
    error::{DataIssue, IngestError, IngestResult},
    grid::UploadedTable,
};

/// What [`prepare`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub cleaned: Vec<String>,
    /// Optional cleanup columns absent from the upload.
    pub skipped: Vec<String>,
    pub derived: Vec<String>,
}

/// Runs every cleanup rule, then every derived field.
///
/// Missing required columns fail fast. Value problems are gathered across all
/// rules so the user sees the whole list at once.
pub fn prepare(table: &mut UploadedTable, config: &Config) -> IngestResult<PrepareReport> {
    let derived = config
        .derived_columns()
        .map_err(|err| IngestError::Input(format!("{err:#}")))?;
    let (cleaned, skipped) = apply_cleanup(table, &config.cleanup)?;
    let derived = apply_derived(table, &derived)?;
    info!(
        "Prepared {} row(s): {} column(s) cleaned, {} derived",
        table.row_count(),
        cleaned.len(),
        derived.len()
    );
    Ok(PrepareReport {
        cleaned,
        skipped,
        derived,
    })
}

pub fn apply_cleanup(
    table: &mut UploadedTable,
    rules: &[CleanupRule],
) -> IngestResult<(Vec<String>, Vec<String>)> {
    if let Some(rule) = rules
        .iter()
        .find(|rule| rule.required && !table.has_column(&rule.column))
    {
        return Err(IngestError::MissingColumn {
            column: rule.column.clone(),
        });
    }

    let mut issues = Vec::new();
    let mut cleaned = Vec::new();
    let mut skipped = Vec::new();
    for rule in rules {
        let Some(idx) = table.column_index(&rule.column) else {
            debug!("Skipping cleanup of absent optional column '{}'", rule.column);
            skipped.push(rule.column.clone());
            continue;
        };
        for (row, cell) in table.column_mut(idx).enumerate() {
            match clean_cell(cell, rule.kind) {
                Ok(value) => *cell = value,
                Err(expected) => issues.push(DataIssue {
                    row: row + 1,
                    column: rule.column.clone(),
                    value: cell.as_display(),
                    expected,
                }),
            }
        }
        cleaned.push(rule.column.clone());
    }

    if !issues.is_empty() {
        return Err(IngestError::DataQuality { issues });
    }
    Ok((cleaned, skipped))
}

/// Returns the cleaned value, or the expected shape when `cell` cannot be coerced.
fn clean_cell(cell: &Cell, kind: CleanupKind) -> Result<Cell, &'static str> {
    match kind {
        CleanupKind::Month => normalize_year_month(cell).map(Cell::Text).ok_or("MMM-YY"),
        _ if cell.is_empty() => Ok(Cell::Empty),
        CleanupKind::Count => parse_count(cell).map(Cell::Integer).ok_or("integer"),
        CleanupKind::Amount => parse_amount(cell).map(Cell::Decimal).ok_or("number"),
        CleanupKind::SegmentId => Ok(Cell::Text(strip_segment_marker(cell))),
    }
}

pub fn apply_derived(
    table: &mut UploadedTable,
    derived: &[DerivedColumn],
) -> IngestResult<Vec<String>> {
    let mut names = Vec::with_capacity(derived.len());
    for column in derived {
        let referenced = column
            .referenced_names()
            .map_err(|err| IngestError::Derive {
                column: column.name.clone(),
                reason: format!("{err:#}"),
            })?;
        if let Some(missing) = referenced
            .into_iter()
            .find(|name| !references_column(table, name))
        {
            return Err(IngestError::MissingColumn { column: missing });
        }
        let values = table
            .rows()
            .iter()
            .map(|row| column.evaluate(table.headers(), row))
            .collect::<anyhow::Result<Vec<Cell>>>()
            .map_err(|err| IngestError::Derive {
                column: column.name.clone(),
                reason: format!("{err:#}"),
            })?;
        table.set_column(&column.name, values);
        names.push(column.name.clone());
    }
    Ok(names)
}

fn references_column(table: &UploadedTable, name: &str) -> bool {
    table
        .headers()
        .iter()
        .any(|header| header == name || normalize_column_name(header) == name)
}

/// Destination table name: an explicit (user-edited) name or the uploaded
/// file name, sanitized either way.
pub fn resolve_table_name(source_name: &str, explicit: Option<&str>) -> String {
    let chosen = explicit
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(source_name);
    sanitize_table_name(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> UploadedTable {
        UploadedTable::new(headers.iter().map(|h| h.to_string()).collect(), rows)
    }

    #[test]
    fn missing_required_column_fails_first() {
        let mut table = table(&["country"], vec![vec![Cell::text("DE")]]);
        let rules = vec![CleanupRule::new("eMonth", CleanupKind::Month, true)];
        let err = apply_cleanup(&mut table, &rules).unwrap_err();
        assert_eq!(err.to_string(), "Column 'eMonth' is missing in the uploaded file");
    }

    #[test]
    fn blank_optional_cells_stay_blank() {
        let mut table = table(
            &["impressions", "segId"],
            vec![
                vec![Cell::text("1,234"), Cell::text("s123")],
                vec![Cell::Empty, Cell::Empty],
            ],
        );
        let rules = vec![
            CleanupRule::new("impressions", CleanupKind::Count, true),
            CleanupRule::new("segId", CleanupKind::SegmentId, false),
            CleanupRule::new("cpm", CleanupKind::Amount, false),
        ];
        let (cleaned, skipped) = apply_cleanup(&mut table, &rules).unwrap();
        assert_eq!(cleaned, vec!["impressions", "segId"]);
        assert_eq!(skipped, vec!["cpm"]);
        assert_eq!(table.rows()[0], vec![Cell::Integer(1234), Cell::text("123")]);
        assert_eq!(table.rows()[1], vec![Cell::Empty, Cell::Empty]);
    }

    #[test]
    fn issues_are_collected_across_rules() {
        let mut table = table(
            &["eMonth", "impressions"],
            vec![
                vec![Cell::text("soon"), Cell::text("lots")],
                vec![Cell::text("Jan-24"), Cell::Integer(2)],
                vec![Cell::Empty, Cell::Integer(3)],
            ],
        );
        let rules = vec![
            CleanupRule::new("eMonth", CleanupKind::Month, true),
            CleanupRule::new("impressions", CleanupKind::Count, true),
        ];
        let Err(IngestError::DataQuality { issues }) = apply_cleanup(&mut table, &rules) else {
            panic!("expected data quality failure");
        };
        let located: Vec<(usize, &str)> = issues
            .iter()
            .map(|issue| (issue.row, issue.column.as_str()))
            .collect();
        assert_eq!(
            located,
            vec![(1, "eMonth"), (3, "eMonth"), (1, "impressions")]
        );
    }

    #[test]
    fn derived_column_needs_its_inputs() {
        let mut table = table(&["country"], vec![vec![Cell::text("DE")]]);
        let derived = vec![DerivedColumn::parse(r#"eDate = eMonth + "-1""#).unwrap()];
        let err = apply_derived(&mut table, &derived).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { column } if column == "eMonth"));
    }

    #[test]
    fn derived_columns_may_call_builtin_functions() {
        let mut table = table(
            &["country", "cpm"],
            vec![
                vec![Cell::text("de"), Cell::Integer(4)],
                vec![Cell::text("fr"), Cell::Integer(-1)],
            ],
        );
        let derived = vec![
            DerivedColumn::parse("region = str::to_uppercase(country)").unwrap(),
            DerivedColumn::parse("safe_cpm = if(cpm > 0, cpm, 0)").unwrap(),
        ];
        let names = apply_derived(&mut table, &derived).unwrap();
        assert_eq!(names, vec!["region", "safe_cpm"]);
        assert_eq!(table.rows()[0][2], Cell::text("DE"));
        assert_eq!(table.rows()[1][3], Cell::Integer(0));
    }

    #[test]
    fn edited_table_names_are_sanitized_again() {
        assert_eq!(
            resolve_table_name("2024 report.xlsx", None),
            "report_2024_report"
        );
        assert_eq!(
            resolve_table_name("x.xlsx", Some("Revenue 2024")),
            "revenue_2024"
        );
        assert_eq!(resolve_table_name("x.xlsx", Some("  ")), "x");
        assert_eq!(resolve_table_name("x.xlsx", Some("2024")), "report_2024");
    }
}
