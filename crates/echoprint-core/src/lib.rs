//! Echoprint Core - Fingerprint Matching Library
//!
//! Decodes codegen fingerprints, scores them against candidates from a
//! store by temporal alignment and picks the best match, for single queries
//! or whole request batches.

pub mod batch;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod matching;
pub mod storage_backend;
pub mod storage_config;

pub use batch::match_all;
pub use config::{MatcherConfig, WindowStrategy};
pub use error::MatchError;
pub use fingerprint::{Fingerprint, Quality};
pub use matching::{calculate_confidence, MatchEngine, MatchResult};
pub use storage_backend::{open_store, CandidateRecord, CandidateStore, MemoryStore, PostgresStore};
pub use storage_config::{EchoprintConfig, StorageBackend};
