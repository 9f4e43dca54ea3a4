use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    cli::InspectArgs,
    config::Config,
    reconcile::{self, ColumnMatch, MatchKind},
    schema::CanonicalSchema,
    session::ColumnMapping,
    table,
    upload::{self, Upload},
};

#[derive(Debug, Serialize)]
struct InspectReport<'a> {
    source: &'a str,
    /// 1-based, as a spreadsheet shows it.
    header_row: usize,
    rows: usize,
    matches: &'a [ColumnMatch],
    unmatched: &'a [String],
    unclaimed: &'a [String],
}

pub fn execute(config: &Config, args: &InspectArgs) -> Result<()> {
    let store = upload::open_store(config)?;
    let schema = CanonicalSchema::assemble(&store.pairs()?, config);
    let Upload {
        source,
        header_row,
        table,
    } = upload::read_upload(&args.source, config, &schema)?;
    let outcome = reconcile::reconcile(
        table.headers(),
        &schema,
        &ColumnMapping::new(),
        &upload::reconcile_options(config),
    );
    info!(
        "Inspected '{}': {} matched, {} unmatched",
        source.name,
        outcome.matches.len(),
        outcome.unmatched.len()
    );

    let report = InspectReport {
        source: &source.name,
        header_row: header_row + 1,
        rows: table.row_count(),
        matches: &outcome.matches,
        unmatched: &outcome.unmatched,
        unclaimed: &outcome.unclaimed,
    };
    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Serializing inspection report")?;
        println!("{rendered}");
        return Ok(());
    }

    println!(
        "Header row: {} ({} data row(s))",
        report.header_row, report.rows
    );
    println!();
    let headers = vec![
        "report column".to_string(),
        "canonical".to_string(),
        "match".to_string(),
    ];
    let rows = outcome
        .matches
        .iter()
        .map(|m| vec![m.original.clone(), m.canonical.clone(), describe(m.kind)])
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    println!();
    println!("Unmatched: {}", list_or_none(&outcome.unmatched));
    println!("Unclaimed: {}", list_or_none(&outcome.unclaimed));
    Ok(())
}

fn describe(kind: MatchKind) -> String {
    match kind {
        MatchKind::Session => "session".to_string(),
        MatchKind::Stored => "stored".to_string(),
        MatchKind::Exact => "exact".to_string(),
        MatchKind::Fuzzy { score } => format!("fuzzy ({score:.2})"),
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}
