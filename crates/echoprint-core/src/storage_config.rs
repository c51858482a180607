//! Configuration file for the matcher
//!
//! Provides TOML-based configuration for selecting the candidate store
//! (corpus directory vs PostgreSQL) and the matcher tuning values.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::MatcherConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EchoprintConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub matching: MatcherConfig,
}

/// Candidate store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
}

/// Candidate store type
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    Postgresql,
}

/// Corpus directory of ingested codegen JSON files
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
        }
    }
}

fn default_base_directory() -> String {
    "./fingerprints".to_string()
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "echoprint".to_string()
}
fn default_user() -> String {
    "echoprint_user".to_string()
}
fn default_password() -> String {
    "echoprint_pass".to_string()
}
fn default_max_connections() -> u32 {
    16
}

impl EchoprintConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: EchoprintConfig =
            toml::from_str(&content).context("Failed to parse TOML config")?;
        config.matching.validate()?;
        Ok(config)
    }

    /// Get PostgreSQL connection string
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    pg.user, pg.password, pg.host, pg.port, pg.database
                ))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EchoprintConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(config.storage.filesystem.base_directory, "./fingerprints");
        assert!(config.connection_string().is_none());
    }

    #[test]
    fn test_connection_string() {
        let mut config = EchoprintConfig::default();
        config.storage.backend = StorageBackend::Postgresql;
        let conn_str = config.connection_string().unwrap();
        assert!(conn_str.contains("postgresql://"));
        assert!(conn_str.contains("echoprint_user"));
        assert!(conn_str.contains("localhost:5432"));
    }

    #[test]
    fn test_parse_postgresql_toml() {
        let toml_str = r#"
            [storage]
            backend = "postgresql"

            [storage.postgresql]
            host = "db.example.com"
            port = 5433
            database = "catalog"
            max_connections = 32

            [matching.scoring]
            slop = 4

            [matching.batch]
            max_concurrency = 8
        "#;

        let config: EchoprintConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Postgresql);
        assert_eq!(config.storage.postgresql.host, "db.example.com");
        assert_eq!(config.storage.postgresql.port, 5433);
        assert_eq!(config.storage.postgresql.user, "echoprint_user");
        assert_eq!(config.matching.scoring.slop, 4);
        assert_eq!(config.matching.scoring.min_db_score_percent, 30.0);
        assert_eq!(config.matching.batch.max_concurrency, 8);
    }

    #[test]
    fn test_load_rejects_invalid_matching() {
        let dir = std::env::temp_dir().join(format!("echoprint-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[matching.scoring]\nslop = 0\n").unwrap();

        assert!(EchoprintConfig::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
