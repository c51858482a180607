//! Matching algorithm and match results
//!
//! A candidate matches when its codes line up with the query's at a
//! consistent time offset. Timestamps are rounded down to a multiple of the
//! slop before comparing, so small re-encode jitter still lands in the same
//! offset bucket.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{MatcherConfig, ScoringConfig};
use crate::error::MatchError;
use crate::fingerprint::Fingerprint;
use crate::storage_backend::{CandidateRecord, CandidateStore};


/// One matched track, as returned to API clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub best: bool,
    pub track_id: u32,
    pub filename: String,
    pub upc: String,
    pub isrc: String,
    /// Percent, 0 to 100
    pub confidence: f32,
    pub ingested_at: String,
    pub error: Option<String>,
}

impl MatchResult {
    fn from_candidate(candidate: &CandidateRecord, confidence: f32) -> Self {
        let meta = &candidate.fingerprint.meta;
        Self {
            best: false,
            track_id: meta.track_id,
            filename: meta.filename.clone(),
            upc: meta.upc.clone(),
            isrc: meta.isrc.clone(),
            confidence,
            ingested_at: candidate.ingested_at.to_rfc3339(),
            error: None,
        }
    }

    /// The single-entry list reported in place of matches when a query fails
    pub fn error_group(err: &MatchError) -> Vec<MatchResult> {
        vec![MatchResult {
            error: Some(err.to_string()),
            ..Default::default()
        }]
    }
}

/// Matches fingerprints against a candidate store
#[derive(Clone)]
pub struct MatchEngine {
    store: Arc<dyn CandidateStore>,
    config: Arc<MatcherConfig>,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn CandidateStore>, config: MatcherConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Find the tracks matching `query`, best first
    ///
    /// Returns an empty list when nothing clears the quality tier's
    /// confidence threshold. Store failures are returned as errors.
    pub async fn match_fingerprint(&self, query: &Fingerprint) -> Result<Vec<MatchResult>, MatchError> {
        let start = Instant::now();

        let clamped;
        let query = if query.is_clamped() {
            query
        } else {
            clamped = query.clamped(&self.config.window);
            &clamped
        };

        let quality = query.quality(&self.config.quality);
        let policy = self.config.tiers.policy(quality);
        log::debug!(
            "Fingerprint quality is '{}', search depth is {} rows, min confidence is {}%",
            quality,
            policy.search_depth,
            policy.min_confidence
        );

        let candidates = self
            .store
            .query(
                query,
                0,
                policy.search_depth,
                self.config.scoring.min_db_score_percent,
            )
            .await
            .map_err(|e| {
                log::error!("Candidate lookup failed: {:#}", e);
                MatchError::StoreQuery(e)
            })?;

        let matches = rank_candidates(query, &candidates, policy.min_confidence, &self.config.scoring);

        log::debug!(
            "match: {} candidates, {} above threshold in {:?}",
            candidates.len(),
            matches.len(),
            start.elapsed()
        );
        Ok(matches)
    }
}

/// Score candidates, drop those below `min_confidence` and rank the rest
pub fn rank_candidates(
    query: &Fingerprint,
    candidates: &[CandidateRecord],
    min_confidence: f32,
    scoring: &ScoringConfig,
) -> Vec<MatchResult> {
    let mut matches: Vec<MatchResult> = candidates
        .par_iter()
        .filter_map(|candidate| {
            let confidence = calculate_confidence(query, &candidate.fingerprint, scoring.slop);
            let track_id = candidate.fingerprint.meta.track_id;
            if confidence >= min_confidence {
                log::debug!(
                    "Match result above minimum threshold, confidence={} track_id={}",
                    confidence,
                    track_id
                );
                Some(MatchResult::from_candidate(candidate, confidence))
            } else {
                log::trace!(
                    "Match result below minimum threshold, confidence={} track_id={}",
                    confidence,
                    track_id
                );
                None
            }
        })
        .collect();

    if matches.is_empty() {
        return matches;
    }

    // equal confidences keep the store's order
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    determine_best_match(&mut matches, scoring.best_match_diff);
    clamp_match_confidence(&mut matches, scoring.max_confidence);
    matches
}

/// Flag the top result as best when it clearly beats the runner-up
///
/// `matches` must be sorted by confidence, descending.
pub fn determine_best_match(matches: &mut [MatchResult], best_match_diff: f32) {
    match matches {
        [] => {}
        [only] => {
            only.best = true;
            log::debug!("Single good match, marking as best: track_id={}", only.track_id);
        }
        [top, second, ..] => {
            if top.confidence - second.confidence >= top.confidence * best_match_diff {
                top.best = true;
                log::debug!(
                    "Multiple good matches, top result is different enough, marking as best: track_id={}",
                    top.track_id
                );
            } else {
                log::debug!("Multiple good matches, top result is not different enough, no best match found");
            }
        }
    }
}

fn clamp_match_confidence(matches: &mut [MatchResult], max_confidence: f32) {
    for m in matches {
        m.confidence = m.confidence.min(max_confidence);
    }
}

/// Percentage of the query's codes aligned with `candidate`
///
/// Every shared code votes for the distance between its (slop-rounded)
/// query and candidate timestamps; the two most popular distances form the
/// score. Only the first `query.len()` candidate codes are considered, which
/// keeps full-song candidates cheap but means partial matches inside longer
/// tracks are not found.
///
/// The result is not capped; duplicate codes can push it above 100.
pub fn calculate_confidence(query: &Fingerprint, candidate: &Fingerprint, slop: u32) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let slop = slop.max(1);

    let candidate_times = code_time_map(candidate, query.len(), slop);

    let mut offsets: HashMap<u32, u32> = HashMap::new();
    for (code, &time) in query.codes().iter().zip(query.times()) {
        if let Some(times) = candidate_times.get(code) {
            let time = discretize(time, slop);
            for &candidate_time in times {
                *offsets.entry(time.abs_diff(candidate_time)).or_insert(0) += 1;
            }
        }
    }

    let (first, second) = offsets.values().fold((0u32, 0u32), |(first, second), &count| {
        if count > first {
            (count, first)
        } else if count > second {
            (first, count)
        } else {
            (first, second)
        }
    });

    (first + second) as f32 / query.len() as f32 * 100.0
}

/// code -> slop-rounded times, over the first `limit` entries
fn code_time_map(fp: &Fingerprint, limit: usize, slop: u32) -> HashMap<u32, Vec<u32>> {
    let limit = limit.min(fp.len());

    let mut code_map: HashMap<u32, Vec<u32>> = HashMap::with_capacity(limit);
    for (&code, &time) in fp.codes()[..limit].iter().zip(&fp.times()[..limit]) {
        code_map.entry(code).or_default().push(discretize(time, slop));
    }
    code_map
}

fn discretize(time: u32, slop: u32) -> u32 {
    time - time % slop
}
