//! Echoprint Database Layer
//!
//! PostgreSQL storage of ingested fingerprints and the ranked candidate
//! lookup used by the matcher.

pub mod connection;
pub mod models;
pub mod operations;

/// Table and index definitions expected by [`operations`]
pub const SCHEMA: &str = include_str!("../schema.sql");

// Re-export commonly used types
pub use connection::{create_pool, ensure_schema, test_connection, DbPool};
pub use models::{CandidateQuery, TrackRow};
pub use operations::{count_tracks, get_track_by_track_id, query_candidates};
