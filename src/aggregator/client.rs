use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::db::queue::{self, Service};

use super::protocol::{self, Discriminator};
use super::registry::{Command, ConnState, ConnectionRegistry};

/// Matches the source's `mg_mgr_poll(&mgr, 500)` tick used both as the
/// supervisor cadence and the per-endpoint retry backoff.
pub const POLL_TICK: Duration = Duration::from_millis(500);

/// Drives one configured endpoint for the lifetime of the process: connect,
/// request health, subscribe, relay notifications into reconciliation,
/// reconnect on drop, and cooperatively close on shutdown. One task per
/// endpoint is the structured-concurrency alternative to the source's
/// single-threaded callback loop sanctioned in SPEC_FULL.md §9; the
/// `ConnectionRegistry` mutex is the only state shared across tasks.
pub async fn run(idx: usize, registry: ConnectionRegistry, pool: SqlitePool, shutting_down: Arc<AtomicBool>) {
    loop {
        registry.set_state(idx, ConnState::Pending).await;
        let url = registry.encoded_url(idx).await;

        let mut ws = match connect_async(&url).await {
            Ok((stream, _response)) => {
                registry.set_state(idx, ConnState::Connected).await;
                tracing::info!(%url, "connected");
                stream
            }
            Err(e) => {
                registry.set_state(idx, ConnState::Disconnected).await;
                tracing::error!(%url, error = %e, "connection failed");
                tokio::time::sleep(POLL_TICK).await;
                if shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                continue;
            }
        };

        if let Err(e) = ws.send(Message::Text(protocol::GET_HEALTH.to_string())).await {
            tracing::error!(%url, error = %e, "failed to send get_health");
            registry.set_state(idx, ConnState::Disconnected).await;
            tokio::time::sleep(POLL_TICK).await;
            continue;
        }
        tracing::debug!(%url, "requesting get_health");

        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        registry.set_command_channel(idx, cmd_tx).await;

        'session: loop {
            tokio::select! {
                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            handle_frame(idx, &registry, &pool, &mut ws, &text).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            on_close(idx, &registry, &pool, "close frame").await;
                            break 'session;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "websocket error");
                            on_close(idx, &registry, &pool, "transport error").await;
                            break 'session;
                        }
                        _ => {}
                    }
                }
                cmd = cmd_rx.recv() => {
                    if let Some(Command::Unsubscribe) = cmd {
                        tracing::debug!(idx, "unsubscribing health");
                        let _ = ws.send(Message::Text(protocol::UNSUBSCRIBE_HEALTH.to_string())).await;
                    }
                }
            }
        }

        if shutting_down.load(Ordering::SeqCst) && registry.state(idx).await.is_terminal() {
            return;
        }

        tokio::time::sleep(POLL_TICK).await;
    }
}

async fn handle_frame(
    idx: usize,
    registry: &ConnectionRegistry,
    pool: &SqlitePool,
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    text: &str,
) {
    let Some((discriminator, parsed)) = protocol::parse_frame(text) else {
        tracing::warn!("empty or malformed JSON response");
        return;
    };

    match discriminator {
        Discriminator::GetHealth => {
            if let Some(name) = parsed.dequeuer.clone() {
                registry.set_dequeuer(idx, name.clone()).await;
                tracing::debug!(dequeuer = %name, "subscribing health");
                reconcile_and_write(pool, &name, &parsed.services).await;
                let _ = ws
                    .send(Message::Text(protocol::SUBSCRIBE_HEALTH.to_string()))
                    .await;
            } else {
                tracing::warn!("get_health response missing dequeuer uri");
            }
        }
        Discriminator::SubscribeHealth => {
            registry.set_state(idx, ConnState::Subscribed).await;
            tracing::debug!(dequeuer = ?registry.dequeuer(idx).await, "subscribed health");
        }
        Discriminator::HealthNotify => {
            let dequeuer = registry.dequeuer(idx).await.or(parsed.dequeuer);
            match dequeuer {
                Some(name) => {
                    tracing::debug!(dequeuer = %name, "health notify");
                    reconcile_and_write(pool, &name, &parsed.services).await;
                }
                None => tracing::warn!("health notification before dequeuer was learned"),
            }
        }
        Discriminator::UnsubscribeHealth => {
            let state = registry.state(idx).await;
            if state == ConnState::Subscribed || state == ConnState::Closing {
                registry.set_state(idx, ConnState::Closed).await;
                if let Some(name) = registry.dequeuer(idx).await {
                    tracing::debug!(dequeuer = %name, "unsubscribed health");
                    if let Err(e) = queue::purge(pool, &name).await {
                        tracing::error!(dequeuer = %name, error = %e, "purge failed");
                    }
                }
            }
        }
        Discriminator::Other => {
            tracing::debug!("unrecognised frame discriminator, ignoring");
        }
    }
}

async fn on_close(idx: usize, registry: &ConnectionRegistry, pool: &SqlitePool, reason: &str) {
    tracing::warn!(idx, reason, "connection close event");
    if registry.state(idx).await > ConnState::Disconnected {
        registry.set_state(idx, ConnState::Closed).await;
    }
    if let Some(name) = registry.dequeuer(idx).await {
        if let Err(e) = queue::purge(pool, &name).await {
            tracing::error!(dequeuer = %name, error = %e, "purge failed");
        }
    }
}

async fn reconcile_and_write(pool: &SqlitePool, dequeuer: &str, services: &[Service]) {
    match queue::read_by_dequeuer(pool, dequeuer).await {
        Ok(mut working) => {
            queue::reconcile(&mut working, dequeuer, services);
            queue::apply(pool, &working).await;
        }
        Err(e) => {
            tracing::error!(%dequeuer, error = %e, "failed to read queues for reconciliation");
        }
    }
}
