use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::destination::LoadMode;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Ingest spreadsheet revenue reports into a database with learned column mappings",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// YAML configuration file (compiled-in defaults when omitted)
    #[arg(short, long, global = true, env = "REVENUE_INGEST_CONFIG")]
    pub config: Option<PathBuf>,
    /// SQLite database holding mappings and loaded reports (overrides the config)
    #[arg(long = "db", global = true, env = "REVENUE_INGEST_DB")]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Map a report's columns, clean it, and load it into the database
    Ingest(IngestArgs),
    /// Show how a report's columns would be matched without changing anything
    Inspect(InspectArgs),
    /// Maintain the stored column mappings
    Mappings(MappingsArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Local report file (.xlsx, .xlsm, .xlsb, .xls, .ods, .csv, .tsv, .txt)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Download the report from this URL instead
    #[arg(short, long)]
    pub url: Option<String>,
    /// Delimiter for text reports (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of text reports (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Pre-answer an unmatched column as `ORIGINAL=CANONICAL`
    #[arg(long = "map", action = clap::ArgAction::Append)]
    pub map: Vec<String>,
    /// Persist the resolved mappings without asking
    #[arg(long = "save-mappings")]
    pub save_mappings: bool,
    /// Destination table (defaults to the sanitized file name)
    #[arg(short, long)]
    pub table: Option<String>,
    /// How to treat an existing destination table
    #[arg(long, value_enum, default_value_t = LoadMode::Create)]
    pub mode: LoadMode,
    /// Never prompt; unanswered columns stay unmapped
    #[arg(short, long)]
    pub yes: bool,
    /// Stop after the cleaned preview without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Rows shown in each preview (overrides the config)
    #[arg(long = "preview-rows")]
    pub preview_rows: Option<usize>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Emit the reconciliation as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MappingsArgs {
    #[command(subcommand)]
    pub command: MappingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum MappingsCommand {
    /// List every stored mapping
    List,
    /// Store or overwrite one mapping
    Add(MappingAddArgs),
    /// Store every alias of the configured canonical dictionary
    Seed,
    /// Delete one stored mapping
    Remove(MappingRemoveArgs),
}

#[derive(Debug, Args)]
pub struct MappingAddArgs {
    /// Column name as it appears in reports
    pub source: String,
    /// Canonical name it maps to
    pub canonical: String,
}

#[derive(Debug, Args)]
pub struct MappingRemoveArgs {
    /// Column name as it appears in reports
    pub source: String,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
