// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

use callq::http::{self, HttpState};

/// A fresh sqlite-backed queues database, migrated and ready to use. Held
/// alongside its `TempDir` so the file outlives the test.
pub async fn test_pool() -> (SqlitePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = callq::db::create_pool(&dir.path().join("queues.db"))
        .await
        .expect("failed to open test database");
    (pool, dir)
}

/// Writes `yaml` to a temp file and returns the path, keeping the
/// `NamedTempFile` alive alongside it.
pub fn write_rules(yaml: &str) -> (PathBuf, tempfile::NamedTempFile) {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    std::io::Write::write_all(&mut file, yaml.as_bytes()).expect("write rules");
    (file.path().to_path_buf(), file)
}

/// Builds the rule engine's full axum router against a given rule file and
/// database pool, with rule caching disabled (the source's default).
pub fn test_app(rules_path: PathBuf, pool: SqlitePool) -> Router {
    let state = Arc::new(HttpState {
        pool,
        rules_path,
        cache: None,
    });
    http::router(state)
}

pub async fn insert_queue(pool: &SqlitePool, uri: &str, state: &str, dequeuer: &str, length: i64) {
    sqlx::query("INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, ?, ?, 0, ?)")
        .bind(uri)
        .bind(state)
        .bind(dequeuer)
        .bind(length)
        .execute(pool)
        .await
        .expect("insert queue row");
}

pub async fn rows_for(pool: &SqlitePool, dequeuer: &str) -> Vec<(String, String, i64)> {
    sqlx::query_as::<_, (String, String, i64)>(
        "SELECT uri, state, length FROM queues WHERE dequeuer = ? ORDER BY uri",
    )
    .bind(dequeuer)
    .fetch_all(pool)
    .await
    .expect("query rows")
}
