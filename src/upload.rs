use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    cli::{IngestArgs, SourceArgs},
    config::Config,
    destination::{self, LoadMode},
    grid::{self, ReadOptions, UploadedTable},
    header, ingest, io_utils,
    prompt::{Prompter, ScriptedPrompter, TerminalPrompter},
    reconcile::{self, ReconcileOptions, Reconciliation},
    resolver::{MappingResolver, Resolution},
    schema::CanonicalSchema,
    session::Session,
    source::{self, SourceFile},
    store::MappingStore,
    table,
};

/// An acquired report sliced at its header row.
pub(crate) struct Upload {
    pub source: SourceFile,
    pub header_row: usize,
    pub table: UploadedTable,
}

pub(crate) fn open_store(config: &Config) -> Result<MappingStore> {
    let path = std::path::Path::new(&config.database);
    let store = MappingStore::open(path, &config.mapping_table)?;
    debug!(
        "Using mapping table '{}' in {:?}",
        store.table(),
        config.database
    );
    Ok(store)
}

pub(crate) fn read_upload(
    args: &SourceArgs,
    config: &Config,
    schema: &CanonicalSchema,
) -> Result<Upload> {
    let source = source::acquire(args.file.as_deref(), args.url.as_deref())?;
    let options = ReadOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let grid = grid::read_grid(&source, &options)?;
    let header_row =
        header::locate_header_row(&grid, &schema.header_tokens(), config.header_scan_rows);
    info!(
        "Header of '{}' found at row {} of {}",
        source.name,
        header_row + 1,
        grid.len()
    );
    let table = UploadedTable::from_grid(grid, header_row);
    Ok(Upload {
        source,
        header_row,
        table,
    })
}

pub(crate) fn reconcile_options(config: &Config) -> ReconcileOptions {
    ReconcileOptions {
        fuzzy: config.fuzzy,
        threshold: config.fuzzy_threshold,
    }
}

pub fn execute(config: &Config, args: &IngestArgs) -> Result<()> {
    let preview_rows = args.preview_rows.unwrap_or(config.preview_rows);
    let mut store = open_store(config)?;
    let schema = CanonicalSchema::assemble(&store.pairs()?, config);
    let upload = read_upload(&args.source, config, &schema)?;
    let format = io_utils::file_extension(&upload.source.name);
    let mut session = Session::start(upload.source.name.clone(), upload.table);
    info!(
        "Session {} ingesting '{}'",
        session.id(),
        session.source_name()
    );
    table::print_preview("Uploaded data", session.table(), preview_rows);

    let mut outcome = reconcile::reconcile(
        session.table().headers(),
        &schema,
        session.mapping(),
        &reconcile_options(config),
    );
    session.apply_reconciliation(&mut outcome)?;
    report_matches(&outcome);

    let mut prompter = build_prompter(args, &outcome)?;
    resolve_unmatched(&mut session, &outcome, prompter.as_mut())?;
    if !session.rename_map().is_empty() {
        print!(
            "{}",
            table::render_pairs("report column", "canonical", &session.rename_map())
        );
        println!();
    }
    table::print_preview("Mapped data", session.table(), preview_rows);

    persist_mappings(
        &mut store,
        &session,
        prompter.as_mut(),
        args,
        format.as_deref(),
    )?;

    let report = ingest::prepare(session.table_mut(), config)?;
    debug!(
        "Session {}: cleaned {:?}, skipped {:?}, derived {:?}",
        session.id(),
        report.cleaned,
        report.skipped,
        report.derived
    );
    table::print_preview("Prepared data", session.table(), preview_rows);

    if args.dry_run {
        println!("Dry run: nothing was written.");
        return Ok(());
    }

    let default_name = ingest::resolve_table_name(session.source_name(), args.table.as_deref());
    let edited = prompter.edit_text("Destination table", &default_name)?;
    let table_name = ingest::resolve_table_name(session.source_name(), Some(&edited));
    if table_name != edited.trim() {
        println!("Using sanitized table name '{table_name}'");
    }
    let question = format!(
        "Load {} row(s) into '{table_name}' ({})?",
        session.table().row_count(),
        describe_mode(args.mode)
    );
    if !prompter.confirm(&question, true)? {
        println!("Load cancelled.");
        return Ok(());
    }

    let summary = destination::load_table(
        store.connection_mut(),
        &table_name,
        session.table(),
        args.mode,
    )?;
    println!(
        "Loaded {} row(s) and {} column(s) into '{}'.",
        summary.rows, summary.columns, summary.table
    );
    info!("Session {} finished", session.id());
    Ok(())
}

fn build_prompter(args: &IngestArgs, outcome: &Reconciliation) -> Result<Box<dyn Prompter>> {
    let scripted =
        ScriptedPrompter::from_assignments(&args.map).context("Parsing --map answers")?;
    for column in scripted.answered_columns() {
        if !outcome.unmatched.iter().any(|unmatched| unmatched == column) {
            warn!("Ignoring --map for '{column}': it is not an unmatched column");
        }
    }
    let interactive = !args.yes && io::stdin().is_terminal();
    debug!("Interactive prompts: {interactive}");
    let prompter = if interactive {
        scripted.with_fallback(Box::new(TerminalPrompter))
    } else {
        scripted
    };
    Ok(Box::new(prompter))
}

fn report_matches(outcome: &Reconciliation) {
    for matched in &outcome.matches {
        debug!(
            "'{}' -> '{}' via {:?}",
            matched.original, matched.canonical, matched.kind
        );
    }
    info!(
        "{} column(s) matched automatically, {} unmatched",
        outcome.matches.len(),
        outcome.unmatched.len()
    );
}

/// Asks about each unmatched column in turn; earlier choices shrink the
/// options offered for later ones.
pub(crate) fn resolve_unmatched(
    session: &mut Session,
    outcome: &Reconciliation,
    prompter: &mut dyn Prompter,
) -> Result<MappingResolver> {
    let mut resolver = MappingResolver::from_reconciliation(outcome);
    let pending: Vec<String> = resolver.pending().map(str::to_string).collect();
    for column in pending {
        let prompt = resolver.prompt_for(&column)?;
        let answer = prompter.choose_mapping(&prompt)?;
        match session.resolve(&mut resolver, &column, answer.as_deref())? {
            Resolution::Resolved {
                original,
                canonical,
            } => info!("Mapped '{original}' to '{canonical}'"),
            Resolution::Pending { original } => {
                warn!("Column '{original}' left unmapped; it will load under its original name")
            }
        }
    }
    Ok(resolver)
}

fn persist_mappings(
    store: &mut MappingStore,
    session: &Session,
    prompter: &mut dyn Prompter,
    args: &IngestArgs,
    format: Option<&str>,
) -> Result<()> {
    let pairs = session.mapping().pairs();
    if pairs.is_empty() {
        return Ok(());
    }
    let question = format!("Save {} column mapping(s) for future reports?", pairs.len());
    if !(args.save_mappings || prompter.confirm(&question, false)?) {
        debug!("Mappings not saved");
        return Ok(());
    }
    if args.dry_run {
        println!("Dry run: {} mapping(s) would be saved.", pairs.len());
        return Ok(());
    }
    let summary = store.upsert(&pairs, format)?;
    println!("{}", summary.message());
    Ok(())
}

fn describe_mode(mode: LoadMode) -> &'static str {
    match mode {
        LoadMode::Create => "new table",
        LoadMode::Append => "append",
        LoadMode::Replace => "replace existing",
    }
}
