//! fpinspect - Decode codegen items and report what the matcher would see
//!
//! Usage:
//!   fpinspect [--config <path>] <queries.json|->

use anyhow::Result;
use clap::Parser;
use echoprint_cli::input::{load_config, read_codegen_list};
use echoprint_cli::output::print_json;
use echoprint_core::{Fingerprint, Quality};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "fpinspect")]
#[command(about = "Decode codegen fingerprints and print a summary", long_about = None)]
struct Args {
    /// Path to configuration file (TOML). If not provided, uses config.toml
    #[arg(short, long)]
    config: Option<String>,

    /// JSON array of codegen items, or "-" for stdin
    queries: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize, Default)]
struct Summary {
    index: usize,
    track_id: u32,
    filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<Quality>,
    codes: usize,
    clamped_codes: usize,
    first_time: Option<u32>,
    last_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = load_config(args.config.as_deref())?.matching;
    let codegen_list = read_codegen_list(&args.queries)?;

    let summaries: Vec<Summary> = codegen_list
        .iter()
        .enumerate()
        .map(|(index, codegen)| {
            let mut summary = Summary {
                index,
                track_id: codegen.metadata.track_id,
                filename: codegen.metadata.filename.clone(),
                ..Default::default()
            };
            match Fingerprint::from_codegen(codegen) {
                Ok(fp) => {
                    summary.quality = Some(fp.quality(&config.quality));
                    summary.codes = fp.len();
                    summary.clamped_codes = fp.clamped(&config.window).len();
                    summary.first_time = fp.times().first().copied();
                    summary.last_time = fp.times().last().copied();
                }
                Err(e) => {
                    log::warn!("Codegen {} failed to decode: {}", index, e);
                    summary.error = Some(e.to_string());
                }
            }
            summary
        })
        .collect();

    print_json(&summaries, true);
    Ok(())
}
