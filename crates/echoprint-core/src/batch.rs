//! Concurrent matching of a request batch
//!
//! Each codegen item is decoded and matched on its own task. At most
//! `batch.max_concurrency` items are in flight; results come back in input
//! order and a failing item only affects its own slot.

use echoprint_fp::CodegenFp;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::MatchError;
use crate::fingerprint::Fingerprint;
use crate::matching::{MatchEngine, MatchResult};

/// Match every item of a batch, one result list per item, in input order
///
/// Must be called from within a Tokio runtime; items run in parallel on a
/// multi-threaded runtime.
pub async fn match_all(engine: &MatchEngine, codegen_list: Vec<CodegenFp>) -> Vec<Vec<MatchResult>> {
    let permits = Arc::new(Semaphore::new(engine.config().batch.workers()));
    let mut handles = Vec::with_capacity(codegen_list.len());

    for (group, codegen) in codegen_list.into_iter().enumerate() {
        // the semaphore is never closed
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                handles.push(Err(MatchError::TaskFailed(e.to_string())));
                continue;
            }
        };

        let engine = engine.clone();
        handles.push(Ok(tokio::spawn(async move {
            let _permit = permit;
            match_one(&engine, group, codegen).await
        })));
    }

    let mut all_matches = Vec::with_capacity(handles.len());
    for (group, handle) in handles.into_iter().enumerate() {
        let outcome = match handle {
            Ok(handle) => handle
                .await
                .unwrap_or_else(|e| Err(MatchError::TaskFailed(e.to_string()))),
            Err(e) => Err(e),
        };

        all_matches.push(match outcome {
            Ok(matches) => matches,
            Err(e) => {
                log::error!("Codegen {} failed: {}", group, e);
                MatchResult::error_group(&e)
            }
        });
    }

    all_matches
}

async fn match_one(
    engine: &MatchEngine,
    group: usize,
    codegen: CodegenFp,
) -> Result<Vec<MatchResult>, MatchError> {
    log::info!(
        "Processing codegen {}: track_id={} filename={:?} bitrate={}",
        group,
        codegen.metadata.track_id,
        codegen.metadata.filename,
        codegen.metadata.bitrate
    );

    // inflating is CPU bound, keep it off the async workers
    let fingerprint = tokio::task::spawn_blocking(move || Fingerprint::from_codegen(&codegen))
        .await
        .map_err(|e| MatchError::TaskFailed(e.to_string()))??;

    let matches = engine.match_fingerprint(&fingerprint).await?;

    log::info!("Number of matches found for codegen {}: {}", group, matches.len());
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatcherConfig;
    use crate::storage_backend::MemoryStore;
    use chrono::Utc;
    use echoprint_fp::Metadata;

    fn codes_for(track_id: u32) -> Vec<u32> {
        (0..40).map(|i| track_id * 1000 + i).collect()
    }

    fn times() -> Vec<u32> {
        (0..40).map(|i| i * 3).collect()
    }

    fn codegen(track_id: u32) -> CodegenFp {
        CodegenFp {
            metadata: Metadata {
                track_id,
                ..Default::default()
            },
            code: echoprint_fp::encode(&codes_for(track_id), &times()).unwrap(),
        }
    }

    fn engine_with_tracks(track_ids: &[u32], max_concurrency: usize) -> MatchEngine {
        let mut store = MemoryStore::new();
        for &track_id in track_ids {
            let meta = Metadata {
                track_id,
                filename: format!("{}.mp3", track_id),
                ..Default::default()
            };
            store.insert(Fingerprint::new(codes_for(track_id), times(), meta).unwrap(), Utc::now());
        }
        let mut config = MatcherConfig::default();
        config.batch.max_concurrency = max_concurrency;
        MatchEngine::new(Arc::new(store), config)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_corrupt_item_is_isolated() {
        let engine = engine_with_tracks(&[1], 4);
        let corrupt = CodegenFp {
            metadata: Metadata::default(),
            code: "this is not a codegen payload".to_string(),
        };

        let results = match_all(&engine, vec![codegen(1), corrupt, codegen(7)]).await;

        assert_eq!(results.len(), 3);

        assert_eq!(results[0].len(), 1);
        assert_eq!(results[0][0].track_id, 1);
        assert!(results[0][0].best);
        assert!(results[0][0].error.is_none());

        assert_eq!(results[1].len(), 1);
        let error = results[1][0].error.as_deref().unwrap();
        assert!(error.contains("failed to decode fingerprint"));
        assert!(!results[1][0].best);

        assert!(results[2].is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_follow_input_order() {
        let track_ids: Vec<u32> = (1..=24).collect();
        let engine = engine_with_tracks(&track_ids, 3);

        let batch: Vec<CodegenFp> = track_ids.iter().rev().map(|&id| codegen(id)).collect();
        let results = match_all(&engine, batch).await;

        assert_eq!(results.len(), track_ids.len());
        for (slot, expected) in results.iter().zip(track_ids.iter().rev()) {
            assert_eq!(slot.len(), 1);
            assert_eq!(slot[0].track_id, *expected);
            assert_eq!(slot[0].filename, format!("{}.mp3", expected));
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let engine = engine_with_tracks(&[], 0);
        assert!(match_all(&engine, Vec::new()).await.is_empty());
    }
}
