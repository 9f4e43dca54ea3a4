use revenue_ingest::{
    data::Cell,
    error::IngestError,
    grid::UploadedTable,
    reconcile::{ReconcileOptions, reconcile},
    resolver::{ColumnState, MappingResolver, Resolution},
    schema::{CanonicalSchema, EntryOrigin},
    session::Session,
};

fn upload() -> UploadedTable {
    UploadedTable::new(
        vec![
            "Month of Report".into(),
            "Country".into(),
            "XYZ".into(),
            "ABC".into(),
        ],
        vec![vec![
            Cell::text("Jan-24"),
            Cell::text("DE"),
            Cell::Integer(10),
            Cell::Float(1.5),
        ]],
    )
}

fn schema() -> CanonicalSchema {
    CanonicalSchema::from_pairs(
        [
            ("Month of Report", "eMonth"),
            ("Country", "country"),
            ("netRev", "netRev"),
            ("cpm", "cpm"),
        ],
        EntryOrigin::Dictionary,
    )
}

fn reconciled_session() -> (Session, MappingResolver) {
    let mut session = Session::start("Report Jan-24.xlsx", upload());
    let mut outcome = reconcile(
        session.table().headers(),
        &schema(),
        session.mapping(),
        &ReconcileOptions::default(),
    );
    session.apply_reconciliation(&mut outcome).unwrap();
    (session, MappingResolver::from_reconciliation(&outcome))
}

#[test]
fn resolving_renames_the_table_and_records_the_mapping() {
    let (mut session, mut resolver) = reconciled_session();
    assert_eq!(
        session.table().headers(),
        ["eMonth", "country", "XYZ", "ABC"]
    );
    assert_eq!(resolver.pending().collect::<Vec<_>>(), vec!["XYZ", "ABC"]);

    let resolution = session.resolve(&mut resolver, "XYZ", Some("netRev")).unwrap();
    assert!(matches!(resolution, Resolution::Resolved { .. }));
    assert_eq!(
        session.table().headers(),
        ["eMonth", "country", "netRev", "ABC"]
    );
    assert_eq!(session.mapping().get("XYZ"), Some("netRev"));
    assert_eq!(session.rename_map().len(), 3);
}

#[test]
fn claimed_names_never_reappear_for_later_columns() {
    let (mut session, mut resolver) = reconciled_session();
    assert_eq!(resolver.prompt_for("XYZ").unwrap().options, vec!["netRev", "cpm"]);
    session.resolve(&mut resolver, "XYZ", Some("netRev")).unwrap();

    let later = resolver.prompt_for("ABC").unwrap();
    assert_eq!(later.options, vec!["cpm"]);
    let err = session
        .resolve(&mut resolver, "ABC", Some("netRev"))
        .unwrap_err();
    assert!(matches!(err, IngestError::Resolve(_)));
    assert_eq!(session.table().headers()[3], "ABC");
}

#[test]
fn blank_answers_leave_columns_pending_and_untouched() {
    let (mut session, mut resolver) = reconciled_session();
    let resolution = session.resolve(&mut resolver, "ABC", None).unwrap();
    assert_eq!(
        resolution,
        Resolution::Pending {
            original: "ABC".into()
        }
    );
    assert!(session.mapping().is_empty());
    assert_eq!(resolver.columns()[1].state, ColumnState::Pending);

    session.resolve(&mut resolver, "ABC", Some("cpm")).unwrap();
    assert_eq!(
        resolver.columns()[1].state,
        ColumnState::Resolved("cpm".into())
    );
    assert!(session.resolve(&mut resolver, "ABC", Some("netRev")).is_err());
}

#[test]
fn reset_starts_over_for_a_new_file() {
    let (mut session, mut resolver) = reconciled_session();
    session.resolve(&mut resolver, "XYZ", Some("netRev")).unwrap();
    session.reset("Report Feb-24.xlsx", upload());
    assert!(session.mapping().is_empty());
    assert!(session.rename_map().is_empty());
    assert_eq!(session.table().headers()[0], "Month of Report");
}
