//! Pattern matching for RURI/next-hop/header/weekday condition fields.
//!
//! A pattern string whose first character is `_` is a substring match (the
//! underscore is stripped and the remainder must appear somewhere inside the
//! candidate); any other pattern is an exact match. The convention is terse
//! and undocumented upstream; this is the one place it is explained — every
//! other call site just calls [`Pattern::matches`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Substring(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('_') {
            Some(rest) => Pattern::Substring(rest.to_string()),
            None => Pattern::Exact(raw.to_string()),
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Exact(p) => candidate == p,
            Pattern::Substring(p) => candidate.contains(p.as_str()),
        }
    }
}
