//! Configuration and request loading

use anyhow::{Context, Result};
use echoprint_core::EchoprintConfig;
use echoprint_fp::{parse_codegen, CodegenFp};
use std::io::Read;
use std::path::Path;

const DEFAULT_CONFIG: &str = "config.toml";

/// Load the given config file, else `config.toml` if present, else defaults
pub fn load_config(path: Option<&str>) -> Result<EchoprintConfig> {
    match path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path);
            EchoprintConfig::load(Path::new(path))
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            log::info!("Loading configuration from: {}", DEFAULT_CONFIG);
            EchoprintConfig::load(Path::new(DEFAULT_CONFIG))
        }
        None => {
            log::info!("No configuration file, using defaults");
            Ok(EchoprintConfig::default())
        }
    }
}

/// Read a codegen request list from a file, or stdin for `-`
pub fn read_codegen_list(source: &str) -> Result<Vec<CodegenFp>> {
    let body = if source == "-" {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("Failed to read stdin")?;
        body
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read {}", source))?
    };

    let list = parse_codegen(&body)?;
    log::info!("Read {} codegen items from {}", list.len(), source);
    Ok(list)
}
