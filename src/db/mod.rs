pub mod queue;
pub mod query;

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::AppResult;

/// Opens (creating if absent) the shared queues database and runs pending
/// migrations. Used by both binaries at startup; the aggregator also writes
/// through this pool, the rule engine only ever reads through it.
pub async fn create_pool(path: &Path) -> AppResult<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Opens the database in read-only mode, failing if it does not already
/// exist. Used by the rule engine, which never writes to `queues`.
pub async fn create_read_only_pool(path: &Path) -> AppResult<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .read_only(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    Ok(pool)
}

/// Connectivity probe mirroring the source's `sqlite_CHECK`: confirms the
/// database is reachable and the `queues` table is queryable before the
/// caller does anything else.
pub async fn health_check(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT COUNT(*) FROM queues")
        .fetch_one(pool)
        .await?;
    Ok(())
}
