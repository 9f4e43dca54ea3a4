mod common;

use common::TestWorkspace;
use revenue_ingest::{
    config::Config,
    data::Cell,
    destination::{LoadMode, load_table},
    error::IngestError,
    grid::{ReadOptions, UploadedTable, read_grid},
    header::locate_header_row,
    ingest::{prepare, resolve_table_name},
    reconcile::{ReconcileOptions, reconcile},
    resolver::MappingResolver,
    schema::CanonicalSchema,
    session::Session,
    source::read_file,
};
use rusqlite::Connection;

fn mapped_session(path: &std::path::Path, config: &Config) -> Session {
    let source = read_file(path).unwrap();
    let grid = read_grid(&source, &ReadOptions::default()).unwrap();
    let schema = CanonicalSchema::assemble(&[], config);
    let header_row = locate_header_row(&grid, &schema.header_tokens(), None);
    let mut session = Session::start(source.name.clone(), UploadedTable::from_grid(grid, header_row));
    let mut outcome = reconcile(
        session.table().headers(),
        &schema,
        session.mapping(),
        &ReconcileOptions::default(),
    );
    session.apply_reconciliation(&mut outcome).unwrap();
    let mut resolver = MappingResolver::from_reconciliation(&outcome);
    session.resolve(&mut resolver, "XYZ", Some("netRev")).unwrap();
    session
}

#[test]
fn workbook_is_cleaned_and_loaded() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_xlsx(
        "2024 Partner Report.xlsx",
        &[
            &["Publisher statement"],
            &[],
            &["Month of Report", "Country", "Share of Quantity", "XYZ"],
            &["Jan-24", "DE", "1234", "10.5"],
            &["February 2024", "FR", "99", "3"],
        ],
    );
    let config = Config::default();
    let mut session = mapped_session(&path, &config);
    assert_eq!(
        session.table().headers(),
        ["eMonth", "country", "impressions", "netRev"]
    );

    let report = prepare(session.table_mut(), &config).unwrap();
    assert_eq!(report.derived, vec!["eDate"]);
    let table = session.table();
    assert_eq!(table.rows()[0][0], Cell::text("2024-01"));
    assert_eq!(table.rows()[1][0], Cell::text("2024-02"));
    assert_eq!(table.rows()[0][2], Cell::Integer(1234));
    assert_eq!(table.rows()[0][4], Cell::text("2024-01-1"));

    let name = resolve_table_name(session.source_name(), None);
    assert_eq!(name, "report_2024_partner_report");
    let mut conn = Connection::open(workspace.database()).unwrap();
    let summary = load_table(&mut conn, &name, table, LoadMode::Create).unwrap();
    assert_eq!((summary.rows, summary.columns), (2, 5));

    let (impressions, net): (i64, f64) = conn
        .query_row(
            "SELECT impressions, netRev FROM report_2024_partner_report WHERE country = 'FR'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(impressions, 99);
    assert_eq!(net, 3.0);
}

#[test]
fn bad_months_are_reported_together() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "report.csv",
        "Month of Report,Share of Quantity,XYZ\nsometime,1,2\nJan-24,2,3\nlater,3,4\n",
    );
    let config = Config::default();
    let mut session = mapped_session(&path, &config);
    let err = prepare(session.table_mut(), &config).unwrap_err();
    let IngestError::DataQuality { issues } = &err else {
        panic!("expected data quality error, got {err}");
    };
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[1].row, 3);
    assert!(err.to_string().contains(
        "Value 'sometime' at row 1 in the column 'eMonth' is not in the form of 'MMM-YY'"
    ));
}

#[test]
fn required_column_must_be_mapped() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("report.csv", "Month of Report,XYZ\nJan-24,2\n");
    let config = Config::default();
    let mut session = mapped_session(&path, &config);
    let err = prepare(session.table_mut(), &config).unwrap_err();
    assert!(matches!(err, IngestError::MissingColumn { ref column } if column == "impressions"));
}
