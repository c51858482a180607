use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use echoprint_fp::Metadata;
use tokio_postgres::Row;

use crate::models::*;

const TRACK_COLUMNS: &str =
    "t.id, t.track_id, t.upc, t.isrc, t.version, t.filename, t.bitrate, t.duration, \
     t.codes, t.times, t.ingested_at";

/// Ranked candidate lookup
///
/// Scores each track by the percentage of the query's distinct codes it
/// contains and returns the tracks scoring at least `min_score_percent`,
/// best first.
pub async fn query_candidates(pool: &Pool, query: &CandidateQuery) -> Result<Vec<TrackRow>> {
    if query.codes.is_empty() || query.limit <= 0 {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;

    let codes: Vec<i32> = query.codes.iter().map(|&c| c as i32).collect();
    let total = codes.len() as f64;

    let sql = format!(
        "WITH hits AS (
             SELECT track_pk, COUNT(*)::DOUBLE PRECISION * 100.0 / $2::DOUBLE PRECISION AS score
             FROM track_codes
             WHERE code = ANY($1)
             GROUP BY track_pk
         )
         SELECT {}, h.score
         FROM hits h
         JOIN tracks t ON t.id = h.track_pk
         WHERE h.score >= $3::DOUBLE PRECISION
         ORDER BY h.score DESC, t.id
         OFFSET $4::BIGINT
         LIMIT $5::BIGINT",
        TRACK_COLUMNS
    );

    let rows = client
        .query(
            sql.as_str(),
            &[&codes, &total, &query.min_score_percent, &query.offset, &query.limit],
        )
        .await
        .context("Failed to query candidates")?;

    log::debug!(
        "candidate lookup: {} distinct codes, {} rows (offset {}, limit {})",
        codes.len(),
        rows.len(),
        query.offset,
        query.limit
    );

    rows.iter().map(|r| row_to_track(r, r.get(11))).collect()
}

/// Get the most recently ingested row for an external track id
pub async fn get_track_by_track_id(pool: &Pool, track_id: u32) -> Result<Option<TrackRow>> {
    let client = pool.get().await?;

    let sql = format!(
        "SELECT {} FROM tracks t WHERE t.track_id = $1 ORDER BY t.ingested_at DESC LIMIT 1",
        TRACK_COLUMNS
    );
    let row = client
        .query_opt(sql.as_str(), &[&(track_id as i64)])
        .await
        .context("Failed to get track")?;

    row.map(|r| row_to_track(&r, 100.0)).transpose()
}

/// Number of ingested tracks
pub async fn count_tracks(pool: &Pool) -> Result<i64> {
    let client = pool.get().await?;
    let row = client
        .query_one("SELECT COUNT(*) FROM tracks", &[])
        .await
        .context("Failed to count tracks")?;
    Ok(row.get(0))
}

fn row_to_track(r: &Row, score: f64) -> Result<TrackRow> {
    let track_id: i64 = r.get(1);
    let codes: Vec<i32> = r.get(8);
    let times: Vec<i32> = r.get(9);

    Ok(TrackRow {
        id: r.get(0),
        metadata: Metadata {
            track_id: u32::try_from(track_id)
                .with_context(|| format!("track_id {} out of range", track_id))?,
            upc: r.get(2),
            isrc: r.get(3),
            version: r.get(4),
            filename: r.get(5),
            bitrate: r.get(6),
            duration: r.get(7),
        },
        codes: codes.into_iter().map(|c| c as u32).collect(),
        times: times.into_iter().map(|t| t as u32).collect(),
        ingested_at: r.get(10),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{create_pool, ensure_schema};

    // These tests require a running PostgreSQL instance:
    // cargo test --package echoprint-db -- --ignored

    #[tokio::test]
    #[ignore]
    async fn test_query_candidates_against_live_db() {
        let pool = create_pool("localhost", 5432, "echoprint", "echoprint_user", "echoprint_pass", 4)
            .unwrap();
        ensure_schema(&pool).await.unwrap();

        let query = CandidateQuery::new(&[1, 2, 3], 0, 10, 30.0);
        let rows = query_candidates(&pool, &query).await.unwrap();
        assert!(rows.len() <= 10);
        assert!(rows.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_empty_query_short_circuits() {
        // No codes means no candidates; the pool is never touched
        let pool = create_pool("localhost", 1, "none", "none", "none", 1).unwrap();
        let query = CandidateQuery::new(&[], 0, 10, 30.0);
        let rows = tokio_test::block_on(query_candidates(&pool, &query)).unwrap();
        assert!(rows.is_empty());
    }
}
