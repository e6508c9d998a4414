use serde::Deserialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::AppResult;

/// Pending database action for a queue row, matching the source's `db_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    Purge,
    None,
}

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct QueueRow {
    pub uri: String,
    pub state: String,
    pub dequeuer: String,
    pub max: i64,
    pub length: i64,
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub row: QueueRow,
    pub action: Action,
}

/// One reported service inside a `get_health`/`health` frame's `services`
/// object (see `rules`/aggregator protocol docs for the wire shape).
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub queue_uri: String,
    #[serde(default)]
    pub active: Option<i64>,
    #[serde(default)]
    pub active_calls: i64,
}

/// Maps the `active` state-code field to its textual representation.
/// `0=inactive, 1=active, 2=disabled, 3=full, 4=standby`, anything else
/// (including a missing field) maps to `undefined`.
pub fn state_from_code(code: Option<i64>) -> String {
    match code {
        Some(0) => "inactive",
        Some(1) => "active",
        Some(2) => "disabled",
        Some(3) => "full",
        Some(4) => "standby",
        _ => "undefined",
    }
    .to_string()
}

/// Inverse of [`state_from_code`]; used by the round-trip property test and
/// by anything that needs to compare textual states numerically.
pub fn code_from_state(state: &str) -> Option<i64> {
    match state {
        "inactive" => Some(0),
        "active" => Some(1),
        "disabled" => Some(2),
        "full" => Some(3),
        "standby" => Some(4),
        "undefined" => Some(-1),
        _ => None,
    }
}

/// Reads every row owned by `dequeuer` and tags all of them `DELETE` — the
/// starting point of reconciliation (source: `sqlite_R` + `queue_setCRUD`).
/// Exact-match on `dequeuer`; never `LIKE`, per the storage contract.
pub async fn read_by_dequeuer(pool: &SqlitePool, dequeuer: &str) -> AppResult<Vec<QueueItem>> {
    let rows: Vec<QueueRow> = sqlx::query_as(
        "SELECT uri, state, dequeuer, max, length FROM queues WHERE dequeuer = ?",
    )
    .bind(dequeuer)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| QueueItem {
            row,
            action: Action::Delete,
        })
        .collect())
}

/// Diffs `services` against `working` (built by [`read_by_dequeuer`]),
/// mutating tags in place and appending newly-seen queues as `CREATE`.
/// Mirrors `queue_JSONservices` / `queue_updatebyuri` / `queue_appenditem`.
pub fn reconcile(working: &mut Vec<QueueItem>, dequeuer: &str, services: &[Service]) {
    for svc in services {
        let new_state = state_from_code(svc.active);
        let new_length = svc.active_calls;

        let found = working.iter().position(|i| i.row.uri == svc.queue_uri);

        match found {
            None => working.push(QueueItem {
                row: QueueRow {
                    uri: svc.queue_uri.clone(),
                    state: new_state,
                    dequeuer: dequeuer.to_string(),
                    max: 0,
                    length: new_length,
                },
                action: Action::Create,
            }),
            Some(idx) => {
                let item = &mut working[idx];
                match item.action {
                    Action::None => {
                        // Already settled on this pass; a duplicate entry
                        // for the same uri changes nothing further.
                    }
                    Action::Update | Action::Create => {
                        // Already touched this pass; only an active state
                        // refreshes it further.
                        if new_state == "active" {
                            item.row.state = new_state;
                            item.row.length = new_length;
                        }
                    }
                    Action::Delete | Action::Purge => {
                        if item.row.state == new_state && item.row.length == new_length {
                            item.action = Action::None;
                        } else {
                            item.row.state = new_state;
                            item.row.length = new_length;
                            item.action = Action::Update;
                        }
                    }
                }
            }
        }
    }
}

/// Applies every non-`NONE`-tagged item to the database, each inside its
/// own `BEGIN`/`COMMIT`, matching `sqlite_CUD`. A failure on one row is
/// logged and skipped; the remaining items are still applied.
pub async fn apply(pool: &SqlitePool, items: &[QueueItem]) {
    for item in items {
        if item.action == Action::None {
            continue;
        }
        if let Err(e) = apply_one(pool, item).await {
            tracing::error!(uri = %item.row.uri, dequeuer = %item.row.dequeuer, error = %e, "reconciliation write failed, skipping row");
        }
    }
}

async fn apply_one(pool: &SqlitePool, item: &QueueItem) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    let row = &item.row;

    match item.action {
        Action::Create => {
            sqlx::query(
                "INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&row.uri)
            .bind(&row.state)
            .bind(&row.dequeuer)
            .bind(row.max)
            .bind(row.length)
            .execute(&mut *tx)
            .await?;
        }
        Action::Update => {
            sqlx::query(
                "UPDATE queues SET state = ?, length = ? WHERE uri = ? AND dequeuer = ?",
            )
            .bind(&row.state)
            .bind(row.length)
            .bind(&row.uri)
            .bind(&row.dequeuer)
            .execute(&mut *tx)
            .await?;
        }
        Action::Delete | Action::Purge => {
            sqlx::query("DELETE FROM queues WHERE uri = ? AND dequeuer = ?")
                .bind(&row.uri)
                .bind(&row.dequeuer)
                .execute(&mut *tx)
                .await?;
        }
        Action::None => unreachable!("filtered out by caller"),
    }

    tx.commit().await?;
    Ok(())
}

/// Deletes every row owned by `dequeuer`, each inside its own transaction.
/// Called when an endpoint's connection enters `CLOSED`/`CLOSING` (source:
/// `ws_purge` + `sqlite_PURGE`).
pub async fn purge(pool: &SqlitePool, dequeuer: &str) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM queues WHERE dequeuer = ?")
        .bind(dequeuer)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
