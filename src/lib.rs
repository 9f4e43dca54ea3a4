pub mod cli;
pub mod config;
pub mod data;
pub mod derive;
pub mod destination;
pub mod error;
pub mod grid;
pub mod header;
pub mod ingest;
mod inspect;
pub mod io_utils;
mod mappings_cmd;
pub mod prompt;
pub mod reconcile;
pub mod resolver;
pub mod schema;
pub mod session;
pub mod source;
pub mod store;
pub mod table;
mod upload;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};

use crate::{
    cli::{Cli, Commands, GlobalArgs},
    config::Config,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("revenue_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli.global)?;
    match &cli.command {
        Commands::Ingest(args) => upload::execute(&config, args),
        Commands::Inspect(args) => inspect::execute(&config, args),
        Commands::Mappings(args) => mappings_cmd::execute(&config, args),
    }
}

fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::load_or_default(global.config.as_deref())
        .with_context(|| format!("Loading configuration from {:?}", global.config))?;
    if let Some(database) = &global.database {
        config.database = database.display().to_string();
    }
    debug!(
        "Database {:?}, mapping table '{}', fuzzy {} (> {})",
        config.database, config.mapping_table, config.fuzzy, config.fuzzy_threshold
    );
    Ok(config)
}
