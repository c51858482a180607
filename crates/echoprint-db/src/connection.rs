//! Database connection management

use anyhow::Context;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

pub type DbPool = Pool;

/// Create a PostgreSQL connection pool
pub fn create_pool(
    host: &str,
    port: u16,
    database: &str,
    user: &str,
    password: &str,
    max_connections: u32,
) -> anyhow::Result<DbPool> {
    let mut cfg = Config::new();
    cfg.host = Some(host.to_string());
    cfg.port = Some(port);
    cfg.dbname = Some(database.to_string());
    cfg.user = Some(user.to_string());
    cfg.password = Some(password.to_string());
    cfg.pool = Some(PoolConfig::new(max_connections.max(1) as usize));

    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create PostgreSQL pool")?;

    Ok(pool)
}

/// Test database connection
pub async fn test_connection(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    let row = client.query_one("SELECT 1 as test", &[]).await?;
    let test: i32 = row.get(0);

    if test == 1 {
        Ok(())
    } else {
        anyhow::bail!("Database connection test failed")
    }
}

/// Create the tables the candidate lookup reads from, if missing
pub async fn ensure_schema(pool: &DbPool) -> anyhow::Result<()> {
    let client = pool.get().await?;
    client
        .batch_execute(crate::SCHEMA)
        .await
        .context("Failed to apply schema")?;
    Ok(())
}
