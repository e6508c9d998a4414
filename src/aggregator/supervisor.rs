//! Top-level aggregator event loop: spawns one task per configured
//! endpoint, drives graceful shutdown on SIGINT/SIGTERM, and exits once
//! every endpoint has reached a terminal state (SPEC_FULL.md §4.1, §5).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::{self, queue};
use crate::error::AppResult;

use super::client::{self, POLL_TICK};
use super::config_file;
use super::registry::ConnectionRegistry;

pub async fn run(config_path: &Path, db_path: &Path) -> AppResult<()> {
    let entries = config_file::read(config_path)?;
    let pool = db::create_pool(db_path).await?;
    db::health_check(&pool).await?;

    let registry = ConnectionRegistry::new(entries);
    let shutting_down = Arc::new(AtomicBool::new(false));

    // Mirrors the source's `qngin.c` calling `ws_connect()` for every
    // configured endpoint before entering its poll loop: every endpoint
    // must leave `Unknown` before the termination check below can run,
    // otherwise a fresh registry (all endpoints still `Unknown`, which is
    // itself `<= Disconnected`) reads as "already terminal" and the
    // process would exit before a single connection is attempted.
    registry.mark_all_pending().await;

    let endpoint_count = registry.len().await;
    let mut tasks = Vec::with_capacity(endpoint_count);
    for idx in 0..endpoint_count {
        tasks.push(tokio::spawn(client::run(
            idx,
            registry.clone(),
            pool.clone(),
            shutting_down.clone(),
        )));
    }

    let shutdown_task = tokio::spawn(drive_shutdown(
        registry.clone(),
        pool.clone(),
        shutting_down.clone(),
    ));

    // Termination additionally requires `shutting_down`: without it, a
    // transient window where every endpoint is simultaneously
    // `Disconnected` (e.g. qngin starting before its rngins are up, all
    // endpoints mid-retry-backoff in `client::run`) would read as
    // terminal and exit the process even though every task is about to
    // reconnect on its own.
    loop {
        if shutting_down.load(Ordering::SeqCst) && registry.all_terminal().await {
            break;
        }
        tokio::time::sleep(POLL_TICK).await;
    }

    final_purge(&registry, &pool).await;

    shutdown_task.abort();
    for task in tasks {
        let _ = task.await;
    }

    Ok(())
}

/// Waits for SIGINT/SIGTERM, then fans an unsubscribe instruction out to
/// every subscribed endpoint and purges its rows immediately — the source
/// purges on the CLOSING transition itself rather than waiting for the
/// unsubscribe acknowledgement (SPEC_FULL.md §4.1 "Disconnect policy").
async fn drive_shutdown(registry: ConnectionRegistry, pool: SqlitePool, shutting_down: Arc<AtomicBool>) {
    wait_for_signal().await;
    tracing::info!("shutdown signal received, unsubscribing all endpoints");
    shutting_down.store(true, Ordering::SeqCst);

    let purged = registry.begin_shutdown().await;
    for dequeuer in purged {
        if let Err(e) = queue::purge(&pool, &dequeuer).await {
            tracing::error!(%dequeuer, error = %e, "purge on shutdown failed");
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// One last sweep over every endpoint that ever learned a dequeuer name,
/// matching "the process exits after one final purge pass" — a no-op for
/// endpoints already purged via the CLOSING/CLOSED transitions, but closes
/// the gap for an endpoint that reached CLOSED via a bare connection-close
/// event without ever going through the shutdown signal path.
async fn final_purge(registry: &ConnectionRegistry, pool: &SqlitePool) {
    for dequeuer in registry.known_dequeuers().await {
        if let Err(e) = queue::purge(pool, &dequeuer).await {
            tracing::error!(%dequeuer, error = %e, "final purge failed");
        }
    }
}
