mod common;

use common::TestWorkspace;
use predicates::str::contains;
use rusqlite::Connection;

const REPORT: &str = "Publisher statement,,,\n\
Month of Report,Country,Share of Quantity,XYZ\n\
Jan-24,DE,\"1,234\",10.5\n\
Feb-24,FR,99,3\n";

fn row_count(workspace: &TestWorkspace, table: &str) -> i64 {
    let conn = Connection::open(workspace.database()).expect("open db");
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
        row.get(0)
    })
    .expect("count rows")
}

#[test]
fn file_and_url_together_are_rejected() {
    let workspace = TestWorkspace::new();
    let report = workspace.write("report.csv", REPORT);
    workspace
        .command()
        .args(["ingest", "--yes", "--url", "https://example.invalid/r.csv", "--file"])
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains(
            "Please remove either the url or the uploaded file.",
        ));
}

#[test]
fn ingest_learns_mappings_then_appends() {
    let workspace = TestWorkspace::new();
    let report = workspace.write("2024 Partner Report.csv", REPORT);

    workspace
        .command()
        .args(["ingest", "--yes", "--save-mappings", "--map", "XYZ=netRev", "--file"])
        .arg(&report)
        .assert()
        .success()
        .stdout(contains("New column mappings have been added"))
        .stdout(contains(
            "Loaded 2 row(s) and 5 column(s) into 'report_2024_partner_report'.",
        ));
    assert_eq!(row_count(&workspace, "report_2024_partner_report"), 2);

    workspace
        .command()
        .args(["mappings", "list"])
        .assert()
        .success()
        .stdout(contains("XYZ"))
        .stdout(contains("netRev"));

    workspace
        .command()
        .args(["ingest", "--yes", "--file"])
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains("already exists"));

    // The stored mapping answers 'XYZ' without --map.
    workspace
        .command()
        .args(["ingest", "--yes", "--mode", "append", "--file"])
        .arg(&report)
        .assert()
        .success()
        .stdout(contains("Loaded 2 row(s)"));
    assert_eq!(row_count(&workspace, "report_2024_partner_report"), 4);
}

#[test]
fn column_named_like_a_claimed_field_does_not_abort_ingest() {
    let workspace = TestWorkspace::new();
    let report = workspace.write(
        "clash.csv",
        "Month of Report,Country Name,country,Share of Quantity\nJan-24,DE,Germany,10\n",
    );
    workspace
        .command()
        .args(["ingest", "--yes", "--dry-run", "--file"])
        .arg(&report)
        .assert()
        .success()
        .stdout(contains("country_2"))
        .stdout(contains("Dry run: nothing was written."));
}

#[test]
fn dry_run_writes_nothing() {
    let workspace = TestWorkspace::new();
    let report = workspace.write("dry.csv", REPORT);
    workspace
        .command()
        .args([
            "ingest",
            "--yes",
            "--dry-run",
            "--save-mappings",
            "--map",
            "XYZ=netRev",
            "--file",
        ])
        .arg(&report)
        .assert()
        .success()
        .stdout(contains("Dry run: nothing was written."));

    let conn = Connection::open(workspace.database()).expect("open db");
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'dry'",
            [],
            |row| row.get(0),
        )
        .expect("query schema");
    assert_eq!(tables, 0);
    let stored: i64 = conn
        .query_row("SELECT COUNT(*) FROM report_columns", [], |row| row.get(0))
        .expect("count mappings");
    assert_eq!(stored, 0);
}

#[test]
fn unresolved_required_column_aborts_the_load() {
    let workspace = TestWorkspace::new();
    let report = workspace.write(
        "partial.csv",
        "Month of Report,Country,Units\nJan-24,DE,5\n",
    );
    workspace
        .command()
        .args(["ingest", "--yes", "--file"])
        .arg(&report)
        .assert()
        .failure()
        .stderr(contains(
            "Column 'impressions' is missing in the uploaded file",
        ));
}

#[test]
fn inspect_reports_unmatched_columns_as_json() {
    let workspace = TestWorkspace::new();
    let report = workspace.write("report.csv", REPORT);
    let output = workspace
        .command()
        .args(["inspect", "--json", "--file"])
        .arg(&report)
        .output()
        .expect("run inspect");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["header_row"], 2);
    assert_eq!(json["unmatched"], serde_json::json!(["XYZ"]));
    assert_eq!(json["matches"][0]["canonical"], "eMonth");
    assert_eq!(json["matches"][0]["kind"]["kind"], "exact");
}

#[test]
fn mappings_can_be_added_updated_and_removed() {
    let workspace = TestWorkspace::new();
    workspace
        .command()
        .args(["mappings", "add", "Umsatz", "netRev"])
        .assert()
        .success()
        .stdout(contains("Added mapping 'Umsatz' -> 'netRev'."));
    workspace
        .command()
        .args(["mappings", "add", "Umsatz", "grossRev"])
        .assert()
        .success()
        .stdout(contains("Updated mapping"));
    workspace
        .command()
        .args(["mappings", "remove", "Umsatz"])
        .assert()
        .success();
    workspace
        .command()
        .args(["mappings", "remove", "Umsatz"])
        .assert()
        .failure()
        .stderr(contains("No mapping stored for 'Umsatz'"));
}

#[test]
fn seeding_stores_the_dictionary() {
    let workspace = TestWorkspace::new();
    workspace
        .command()
        .args(["mappings", "seed"])
        .assert()
        .success()
        .stdout(contains("New column mappings have been added"));
    workspace
        .command()
        .args(["mappings", "seed"])
        .assert()
        .success()
        .stdout(contains("0 added"));
}
