use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

/// Per-endpoint connection state. Declared in ascending numeric order so the
/// derived `Ord` matches the source's `conn_t` discriminants exactly —
/// `state <= Disconnected` is the termination test used throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum ConnState {
    Unknown = -1,
    Closed = 0,
    Closing = 1,
    Disconnected = 2,
    Pending = 3,
    Connected = 4,
    Subscribed = 5,
}

impl ConnState {
    /// True for any state from which the endpoint will never progress
    /// again on its own — the condition the supervisor waits for before
    /// letting the process exit.
    pub fn is_terminal(self) -> bool {
        self <= ConnState::Disconnected
    }
}

/// Instruction sent from the supervisor into a running endpoint task.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    Unsubscribe,
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Raw websocket URL as configured.
    pub url: String,
    /// Same URL with `#` percent-encoded to `%23`, used for the actual dial.
    pub encoded_url: String,
    pub state: ConnState,
    pub dequeuer: Option<String>,
    cmd: Option<mpsc::UnboundedSender<Command>>,
}

/// Shared, mutex-guarded list of configured endpoints. All per-endpoint
/// tasks and the supervisor task reach the same state through this handle;
/// it is the one piece of shared mutable state the aggregator has (source:
/// the `p_qlist_t` linked list reached via `mgr.user_data`).
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<Vec<Endpoint>>>,
}

impl ConnectionRegistry {
    pub fn new(urls: Vec<(String, String)>) -> Self {
        let endpoints = urls
            .into_iter()
            .map(|(url, encoded_url)| Endpoint {
                url,
                encoded_url,
                state: ConnState::Unknown,
                dequeuer: None,
                cmd: None,
            })
            .collect();
        Self {
            inner: Arc::new(Mutex::new(endpoints)),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Lifts every endpoint out of `Unknown` into `Pending` synchronously,
    /// before any per-endpoint task has had a chance to run. Mirrors the
    /// source's `qngin.c` calling `ws_connect()` for each configured
    /// endpoint before ever entering its poll loop, so the termination
    /// check never observes the initial all-`Unknown` registry as
    /// "already terminal".
    pub async fn mark_all_pending(&self) {
        for e in self.inner.lock().await.iter_mut() {
            e.state = ConnState::Pending;
        }
    }

    pub async fn encoded_url(&self, idx: usize) -> String {
        self.inner.lock().await[idx].encoded_url.clone()
    }

    pub async fn set_state(&self, idx: usize, state: ConnState) {
        self.inner.lock().await[idx].state = state;
    }

    pub async fn state(&self, idx: usize) -> ConnState {
        self.inner.lock().await[idx].state
    }

    pub async fn set_dequeuer(&self, idx: usize, name: String) {
        self.inner.lock().await[idx].dequeuer = Some(name);
    }

    pub async fn dequeuer(&self, idx: usize) -> Option<String> {
        self.inner.lock().await[idx].dequeuer.clone()
    }

    pub async fn set_command_channel(&self, idx: usize, tx: mpsc::UnboundedSender<Command>) {
        self.inner.lock().await[idx].cmd = Some(tx);
    }

    pub async fn all_terminal(&self) -> bool {
        self.inner.lock().await.iter().all(|e| e.state.is_terminal())
    }

    /// Every dequeuer name learned so far across all endpoints, for the
    /// supervisor's final purge pass.
    pub async fn known_dequeuers(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .iter()
            .filter_map(|e| e.dequeuer.clone())
            .collect()
    }

    /// Fans an unsubscribe instruction out to every currently-subscribed
    /// endpoint and marks it `CLOSING`, returning the dequeuer names that
    /// transitioned (for the caller to purge). Mirrors the source's
    /// `MG_EV_POLL` signal branch.
    pub async fn begin_shutdown(&self) -> Vec<String> {
        let mut purged = vec![];
        let mut guard = self.inner.lock().await;
        for e in guard.iter_mut() {
            if e.state == ConnState::Subscribed {
                if let Some(tx) = &e.cmd {
                    let _ = tx.send(Command::Unsubscribe);
                }
                e.state = ConnState::Closing;
                if let Some(dq) = &e.dequeuer {
                    purged.push(dq.clone());
                }
            }
        }
        purged
    }
}
