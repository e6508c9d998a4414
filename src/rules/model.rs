//! In-memory rule model (SPEC_FULL.md §3, "Rule").
//!
//! A [`Rule`] carries both the static fields parsed from YAML and the
//! per-evaluation runtime fields (`valid`, `hits`, `use_flag`, and a mutable
//! copy of `add`) the condition pipeline mutates. Every HTTP request gets
//! its own `Vec<Rule>` (a full clone, even when the underlying parse is
//! cached — see [`crate::rules::cache`]), so these runtime fields are never
//! shared across requests.

use super::pattern::Pattern;
use super::time::TimeToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A size requirement on a queue's current `length`: `<N`, `>N`, or `=N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeOp {
    LessThan(i64),
    GreaterThan(i64),
    Equal(i64),
}

impl SizeOp {
    pub fn matches(self, length: i64) -> bool {
        match self {
            SizeOp::LessThan(n) => length < n,
            SizeOp::GreaterThan(n) => length > n,
            SizeOp::Equal(n) => length == n,
        }
    }
}

/// One `(queue-uri, state-requirement, size-requirement)` candidate from a
/// rule's `queues` block, ordered by ascending `prio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCandidate {
    pub uri: String,
    pub state: String,
    pub size: SizeOp,
    pub prio: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub day: Vec<String>,
    pub time: Vec<TimeToken>,
    pub ruri: Option<Pattern>,
    pub next: Option<Pattern>,
    /// `(header name, pattern)` pairs in declaration order; consecutive
    /// pairs sharing the same name are OR'd, distinct names are AND'd
    /// (SPEC_FULL.md §4.4 step 5).
    pub header: Vec<(String, Pattern)>,
    pub queues: Vec<QueueCandidate>,
}

#[derive(Debug, Clone, Default)]
pub struct Actions {
    pub add: Vec<Header>,
    pub route: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub name: Option<String>,
    pub priority: i64,
    pub transport: Option<String>,
    pub conditions: Conditions,
    pub actions: Actions,
    /// `default` block: first item is the fallback route, the rest are
    /// headers substituted for `actions.add` when the fallback is taken.
    pub default_route: Option<String>,
    pub default_headers: Vec<Header>,

    // Runtime fields, reset at the start of every evaluation.
    pub valid: bool,
    pub hits: u32,
    pub use_flag: bool,
}

impl Rule {
    pub fn reset_runtime(&mut self) {
        self.valid = true;
        self.hits = 0;
        self.use_flag = false;
    }
}
