//! JSON structures exchanged with codegen
//!
//! A match request is a JSON array of [`CodegenFp`] items. Ingested corpus
//! files use the same shape plus an optional ingestion timestamp.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{self, DecodeError};

/// Track metadata carried alongside a codegen payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub track_id: u32,
    pub upc: String,
    pub isrc: String,
    /// Codegen encoder version
    pub version: f64,
    pub filename: String,
    /// Source bitrate in kbps, 0 when unknown
    pub bitrate: f64,
    /// Duration in seconds
    pub duration: f64,
}

/// A single codegen output: metadata plus the compressed `code` string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodegenFp {
    #[serde(default)]
    pub metadata: Metadata,
    pub code: String,
}

impl CodegenFp {
    /// Decode the `code` payload into `(codes, times)`
    pub fn decode(&self) -> Result<(Vec<u32>, Vec<u32>), DecodeError> {
        codec::decode(&self.code)
    }
}

/// A previously ingested codegen record, as kept in a corpus directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedCodegen {
    #[serde(flatten)]
    pub codegen: CodegenFp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
}

impl IngestedCodegen {
    /// Load from JSON file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let record: IngestedCodegen = serde_json::from_str(&json_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(record)
    }

    /// Save to JSON file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json_str = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_str)?;
        Ok(())
    }
}

/// Parse a match request body (a JSON array of codegen items)
pub fn parse_codegen(data: &[u8]) -> anyhow::Result<Vec<CodegenFp>> {
    serde_json::from_slice(data).context("Failed to parse codegen list")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codegen_list() {
        let body = br#"[
            {"metadata": {"track_id": 42, "upc": "0001", "isrc": "USRC1", "version": 4.12,
                          "filename": "a.mp3", "bitrate": 320, "duration": 215.5},
             "code": "eJwzMDAwMARiA6PEpOSU1DQQAAAysgXR"},
            {"code": "eJwDAAAAAAE="}
        ]"#;

        let list = parse_codegen(body).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].metadata.track_id, 42);
        assert_eq!(list[0].metadata.bitrate, 320.0);
        assert_eq!(list[0].metadata.filename, "a.mp3");
        assert_eq!(list[1].metadata, Metadata::default());

        let (codes, times) = list[0].decode().unwrap();
        assert_eq!(codes.len(), times.len());
    }

    #[test]
    fn test_parse_rejects_non_list() {
        assert!(parse_codegen(br#"{"code": "x"}"#).is_err());
    }

    #[test]
    fn test_ingested_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("echoprint-fp-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("track.json");

        let record = IngestedCodegen {
            codegen: CodegenFp {
                metadata: Metadata {
                    track_id: 7,
                    filename: "seven.mp3".to_string(),
                    ..Default::default()
                },
                code: "eJwzMDAwMARiA6PEpOSU1DQQAAAysgXR".to_string(),
            },
            ingested_at: Some(DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc)),
        };
        record.save(&path).unwrap();

        let loaded = IngestedCodegen::load(&path).unwrap();
        assert_eq!(loaded.codegen, record.codegen);
        assert_eq!(loaded.ingested_at, record.ingested_at);

        std::fs::remove_dir_all(&dir).ok();
    }
}
