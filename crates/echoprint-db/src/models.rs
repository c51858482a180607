use chrono::{DateTime, Utc};
use echoprint_fp::Metadata;
use serde::{Deserialize, Serialize};

/// An ingested fingerprint as stored in the `tracks` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRow {
    pub id: i32,
    pub metadata: Metadata,
    pub codes: Vec<u32>,
    pub times: Vec<u32>,
    pub ingested_at: DateTime<Utc>,
    /// Percentage of the query's distinct codes found in this track
    pub score: f64,
}

/// Parameters of a ranked candidate lookup
#[derive(Debug, Clone, Default)]
pub struct CandidateQuery {
    /// Distinct query codes
    pub codes: Vec<u32>,
    pub offset: i64,
    pub limit: i64,
    pub min_score_percent: f64,
}

impl CandidateQuery {
    /// Build a lookup from raw query codes, deduplicating them
    pub fn new(codes: &[u32], offset: usize, limit: usize, min_score_percent: f64) -> Self {
        let mut codes = codes.to_vec();
        codes.sort_unstable();
        codes.dedup();
        Self {
            codes,
            offset: offset as i64,
            limit: limit as i64,
            min_score_percent,
        }
    }
}
