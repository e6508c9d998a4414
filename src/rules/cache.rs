//! Optional mtime-gated cache for the parsed rule file (SPEC_FULL.md §9,
//! "Rule re-parsing per request"). Disabled by default — `rngin` re-parses
//! the YAML file on every request unless this is opted into — and even when
//! enabled, callers still clone a private `Vec<Rule>` out of it per request
//! so per-request runtime state (`valid`/`hits`/`use_flag`/`add`) is never
//! shared.

use std::path::PathBuf;
use std::time::SystemTime;

use tokio::sync::Mutex;

use crate::error::AppResult;

use super::model::Rule;
use super::parse;

struct Cached {
    mtime: SystemTime,
    rules: Vec<Rule>,
}

pub struct RuleCache {
    path: PathBuf,
    cached: Mutex<Option<Cached>>,
}

impl RuleCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: Mutex::new(None),
        }
    }

    /// Returns a fresh private `Vec<Rule>`, re-parsing from disk only if the
    /// file's mtime has changed (or nothing is cached yet).
    pub async fn rules(&self) -> AppResult<Vec<Rule>> {
        let mtime = std::fs::metadata(&self.path)?.modified()?;

        let mut guard = self.cached.lock().await;
        let needs_reload = match &*guard {
            Some(c) => c.mtime != mtime,
            None => true,
        };

        if needs_reload {
            let rules = parse::load(&self.path)?;
            *guard = Some(Cached { mtime, rules });
        }

        Ok(guard.as_ref().unwrap().rules.clone())
    }
}
