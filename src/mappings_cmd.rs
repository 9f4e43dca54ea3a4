use anyhow::{Result, bail};
use log::info;

use crate::{
    cli::{MappingsArgs, MappingsCommand},
    config::Config,
    schema::{CanonicalSchema, EntryOrigin},
    table, upload,
};

pub fn execute(config: &Config, args: &MappingsArgs) -> Result<()> {
    let mut store = upload::open_store(config)?;
    match &args.command {
        MappingsCommand::List => {
            let rows = store
                .fetch()?
                .into_iter()
                .map(|row| {
                    vec![
                        row.report_column,
                        row.required_column,
                        row.excel_format.unwrap_or_default(),
                        row.updated_ts,
                    ]
                })
                .collect::<Vec<_>>();
            if rows.is_empty() {
                println!("No column mappings stored in '{}'.", store.table());
                return Ok(());
            }
            let headers = ["report column", "canonical", "format", "updated"]
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
        }
        MappingsCommand::Add(add) => {
            let source = add.source.trim();
            let canonical = add.canonical.trim();
            if source.is_empty() || canonical.is_empty() {
                bail!("Both the report column and the canonical name are required");
            }
            let summary = store.upsert(&[(source.to_string(), canonical.to_string())], None)?;
            if summary.any_created() {
                println!("Added mapping '{source}' -> '{canonical}'.");
            } else {
                println!("Updated mapping '{source}' -> '{canonical}'.");
            }
        }
        MappingsCommand::Seed => {
            let pairs = CanonicalSchema::from_pairs(config.alias_pairs(), EntryOrigin::Dictionary)
                .entries()
                .iter()
                .map(|entry| (entry.source.clone(), entry.canonical.clone()))
                .collect::<Vec<_>>();
            let summary = store.upsert(&pairs, None)?;
            info!(
                "Seeded {} dictionary alias(es) into '{}'",
                pairs.len(),
                store.table()
            );
            println!(
                "{} ({} added, {} updated)",
                summary.message(),
                summary.created,
                summary.updated
            );
        }
        MappingsCommand::Remove(remove) => {
            if store.remove(remove.source.trim())? {
                println!("Removed mapping for '{}'.", remove.source.trim());
            } else {
                bail!("No mapping stored for '{}'", remove.source.trim());
            }
        }
    }
    Ok(())
}
