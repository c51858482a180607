//! Candidate store trait and implementations
//!
//! The matcher only needs one read-only operation from storage: a ranked
//! lookup of ingested fingerprints sharing codes with a query. Backends must
//! tolerate concurrent queries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use echoprint_fp::IngestedCodegen;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fingerprint::Fingerprint;
use crate::storage_config::{EchoprintConfig, PostgresqlConfig, StorageBackend};

/// An ingested fingerprint returned by a candidate lookup
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub fingerprint: Fingerprint,
    pub ingested_at: DateTime<Utc>,
    /// Store relevance, percent of the query's distinct codes found
    pub score: f32,
}

/// Abstract candidate store
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Up to `limit` candidates scoring at least `min_score_percent`,
    /// best first, skipping the first `offset`
    async fn query(
        &self,
        fingerprint: &Fingerprint,
        offset: usize,
        limit: usize,
        min_score_percent: f32,
    ) -> Result<Vec<CandidateRecord>>;
}

/// Build the store selected by the configuration file
pub async fn open_store(config: &EchoprintConfig) -> Result<Arc<dyn CandidateStore>> {
    match config.storage.backend {
        StorageBackend::Filesystem => {
            let dir = &config.storage.filesystem.base_directory;
            log::info!("Using filesystem corpus: {}", dir);
            Ok(Arc::new(MemoryStore::load_dir(Path::new(dir))?))
        }
        StorageBackend::Postgresql => {
            log::info!(
                "Using PostgreSQL store: {}:{}/{}",
                config.storage.postgresql.host,
                config.storage.postgresql.port,
                config.storage.postgresql.database
            );
            Ok(Arc::new(PostgresStore::new(&config.storage.postgresql).await?))
        }
    }
}

struct StoredTrack {
    fingerprint: Fingerprint,
    code_set: HashSet<u32>,
    ingested_at: DateTime<Utc>,
}

/// In-process corpus, optionally loaded from a directory of codegen files
#[derive(Default)]
pub struct MemoryStore {
    tracks: Vec<StoredTrack>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ingested fingerprint
    pub fn insert(&mut self, fingerprint: Fingerprint, ingested_at: DateTime<Utc>) {
        let code_set = fingerprint.codes().iter().copied().collect();
        self.tracks.push(StoredTrack {
            fingerprint,
            code_set,
            ingested_at,
        });
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Load every `*.json` ingested codegen record in `dir`
    ///
    /// Files that fail to parse or decode are skipped with a warning. Records
    /// without an `ingested_at` use the file modification time.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let load_start = std::time::Instant::now();

        let files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read corpus directory {}", dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
            })
            .collect();

        log::info!("Found {} corpus files, loading in parallel...", files.len());

        let loaded: Vec<(Fingerprint, DateTime<Utc>)> = files
            .par_iter()
            .filter_map(|path| match load_record(path) {
                Ok(loaded) => Some(loaded),
                Err(e) => {
                    log::warn!("Failed to load {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();

        let mut store = Self::new();
        for (fingerprint, ingested_at) in loaded {
            store.insert(fingerprint, ingested_at);
        }

        log::info!(
            "Loaded {} fingerprints in {:.2}s",
            store.len(),
            load_start.elapsed().as_secs_f64()
        );
        Ok(store)
    }
}

fn load_record(path: &Path) -> Result<(Fingerprint, DateTime<Utc>)> {
    let record = IngestedCodegen::load(path)?;
    let fingerprint = Fingerprint::from_codegen(&record.codegen)?;
    let ingested_at = match record.ingested_at {
        Some(at) => at,
        None => DateTime::<Utc>::from(std::fs::metadata(path)?.modified()?),
    };
    Ok((fingerprint, ingested_at))
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn query(
        &self,
        fingerprint: &Fingerprint,
        offset: usize,
        limit: usize,
        min_score_percent: f32,
    ) -> Result<Vec<CandidateRecord>> {
        let query_codes: HashSet<u32> = fingerprint.codes().iter().copied().collect();
        if query_codes.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let total = query_codes.len() as f32;

        let mut scored: Vec<(usize, f32)> = self
            .tracks
            .par_iter()
            .enumerate()
            .filter_map(|(i, track)| {
                let hits = query_codes
                    .iter()
                    .filter(|code| track.code_set.contains(*code))
                    .count();
                let score = hits as f32 * 100.0 / total;
                (hits > 0 && score >= min_score_percent).then_some((i, score))
            })
            .collect();

        // stable on insertion order for equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(scored
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(i, score)| CandidateRecord {
                fingerprint: self.tracks[i].fingerprint.clone(),
                ingested_at: self.tracks[i].ingested_at,
                score,
            })
            .collect())
    }
}

/// PostgreSQL-based candidate store
pub struct PostgresStore {
    pool: echoprint_db::DbPool,
}

impl PostgresStore {
    /// Connect and verify the pool
    pub async fn new(config: &PostgresqlConfig) -> Result<Self> {
        let pool = echoprint_db::create_pool(
            &config.host,
            config.port,
            &config.database,
            &config.user,
            &config.password,
            config.max_connections,
        )?;

        // Test the connection
        echoprint_db::test_connection(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CandidateStore for PostgresStore {
    async fn query(
        &self,
        fingerprint: &Fingerprint,
        offset: usize,
        limit: usize,
        min_score_percent: f32,
    ) -> Result<Vec<CandidateRecord>> {
        let query = echoprint_db::CandidateQuery::new(
            fingerprint.codes(),
            offset,
            limit,
            min_score_percent as f64,
        );
        let rows = echoprint_db::query_candidates(&self.pool, &query).await?;

        rows.into_iter()
            .map(|row| -> Result<CandidateRecord> {
                Ok(CandidateRecord {
                    fingerprint: Fingerprint::new(row.codes, row.times, row.metadata)?,
                    ingested_at: row.ingested_at,
                    score: row.score as f32,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoprint_fp::{CodegenFp, Metadata};

    fn track(track_id: u32, codes: Vec<u32>) -> Fingerprint {
        let times = (0..codes.len() as u32).collect();
        let meta = Metadata {
            track_id,
            ..Default::default()
        };
        Fingerprint::new(codes, times, meta).unwrap()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let now = Utc::now();
        store.insert(track(1, vec![1, 2, 3, 4]), now);
        store.insert(track(2, vec![1, 2, 90, 91]), now);
        store.insert(track(3, vec![1, 80, 81, 82]), now);
        store.insert(track(4, vec![70, 71, 72, 73]), now);
        store.insert(track(5, vec![1, 2, 3, 99]), now);
        store
    }

    fn ids(records: &[CandidateRecord]) -> Vec<u32> {
        records.iter().map(|r| r.fingerprint.meta.track_id).collect()
    }

    #[tokio::test]
    async fn test_memory_store_ranks_by_shared_codes() {
        let query = track(0, vec![1, 2, 3, 4, 1]);
        let results = store().query(&query, 0, 10, 0.0).await.unwrap();

        assert_eq!(ids(&results), vec![1, 5, 2, 3]);
        assert_eq!(results[0].score, 100.0);
        assert_eq!(results[1].score, 75.0);
        assert_eq!(results[3].score, 25.0);
    }

    #[tokio::test]
    async fn test_memory_store_floor_offset_and_limit() {
        let query = track(0, vec![1, 2, 3, 4]);
        let store = store();

        let above_floor = store.query(&query, 0, 10, 30.0).await.unwrap();
        assert_eq!(ids(&above_floor), vec![1, 5, 2]);

        let page = store.query(&query, 1, 1, 30.0).await.unwrap();
        assert_eq!(ids(&page), vec![5]);

        assert!(store.query(&query, 0, 0, 30.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_empty_query() {
        let query = track(0, Vec::new());
        assert!(store().query(&query, 0, 10, 0.0).await.unwrap().is_empty());
    }

    #[test]
    fn test_load_dir_skips_bad_files() {
        let dir = std::env::temp_dir().join(format!("echoprint-corpus-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let good = IngestedCodegen {
            codegen: CodegenFp {
                metadata: Metadata {
                    track_id: 11,
                    ..Default::default()
                },
                code: echoprint_fp::encode(&[5, 6], &[0, 1]).unwrap(),
            },
            ingested_at: None,
        };
        good.save(&dir.join("good.json")).unwrap();
        std::fs::write(dir.join("broken.json"), r#"{"code": "!!!"}"#).unwrap();
        std::fs::write(dir.join("ignored.txt"), "not a corpus file").unwrap();

        let store = MemoryStore::load_dir(&dir).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.tracks[0].fingerprint.meta.track_id, 11);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL to be running
    async fn test_postgres_store_connects() {
        let store = PostgresStore::new(&PostgresqlConfig::default()).await.unwrap();
        let query = track(0, vec![1, 2, 3]);
        assert!(store.query(&query, 0, 10, 30.0).await.is_ok());
    }
}
