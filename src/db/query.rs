use sqlx::SqlitePool;

use crate::error::AppResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueState {
    pub state: String,
    pub max: i64,
    pub length: i64,
}

/// Looks up a queue's state/capacity/length by exact uri, for the rule
/// engine's queue-predicate evaluation (source: `sqlite_QUERY`).
///
/// The source built this query by string-interpolating the uri into a
/// `LIKE` clause. This binds the parameter and matches with `=`: the
/// source's actual inputs never carried `%`/`_` wildcards, so exact match
/// preserves behaviour while closing the injection surface.
pub async fn lookup(pool: &SqlitePool, uri: &str) -> AppResult<Option<QueueState>> {
    let row = sqlx::query_as::<_, QueueState>(
        "SELECT state, max, length FROM queues WHERE uri = ?",
    )
    .bind(uri)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn lookup_returns_none_for_unknown_uri() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queues.db");
        let pool = db::create_pool(&db_path).await.unwrap();

        let result = lookup(&pool, "sip:nowhere@h").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn lookup_finds_exact_uri_only() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("queues.db");
        let pool = db::create_pool(&db_path).await.unwrap();

        sqlx::query("INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, ?, ?, ?, ?)")
            .bind("sip:q1@h")
            .bind("active")
            .bind("sip:dq@h")
            .bind(10)
            .bind(2)
            .execute(&pool)
            .await
            .unwrap();

        assert!(lookup(&pool, "sip:q1@").await.unwrap().is_none());
        let found = lookup(&pool, "sip:q1@h").await.unwrap().unwrap();
        assert_eq!(found.state, "active");
        assert_eq!(found.length, 2);
    }
}
