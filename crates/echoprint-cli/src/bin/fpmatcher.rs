//! fpmatcher - Codegen fingerprint matcher
//!
//! Usage:
//!   fpmatcher <queries.json>                      # Uses config.toml if present
//!   fpmatcher --config <path> <queries.json>      # Uses custom config
//!   fpmatcher --db-dir <dir> <queries.json>       # Corpus directory, default tuning
//!   cat queries.json | fpmatcher -                # Read the request from stdin

use anyhow::Result;
use clap::Parser;
use echoprint_cli::input::{load_config, read_codegen_list};
use echoprint_cli::output::print_json_results;
use echoprint_core::{match_all, open_store, MatchEngine, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "fpmatcher")]
#[command(about = "Match codegen fingerprints against a corpus", long_about = None)]
struct Args {
    /// Path to configuration file (TOML). If not provided, uses config.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Corpus directory of ingested codegen JSON files (overrides the configured store)
    #[arg(long)]
    db_dir: Option<String>,

    /// JSON array of codegen items, or "-" for stdin
    queries: String,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(db_dir) = args.db_dir {
        config.storage.backend = StorageBackend::Filesystem;
        config.storage.filesystem.base_directory = db_dir;
    }

    let codegen_list = read_codegen_list(&args.queries)?;

    let store = open_store(&config).await?;
    let engine = MatchEngine::new(store, config.matching);

    let match_start = std::time::Instant::now();
    let results = match_all(&engine, codegen_list).await;
    log::info!(
        "Matching completed in {:.2}s",
        match_start.elapsed().as_secs_f64()
    );

    print_json_results(&results, args.pretty);

    Ok(())
}
