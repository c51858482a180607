use echoprint_fp::DecodeError;
use thiserror::Error;

/// Why a single query produced no match list
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("failed to decode fingerprint: {0}")]
    Decode(#[from] DecodeError),

    #[error("candidate store query failed: {0:#}")]
    StoreQuery(anyhow::Error),

    #[error("match task failed: {0}")]
    TaskFailed(String),
}
