//! YAML rule-file parsing (SPEC_FULL.md §4.3).
//!
//! The source hand-scans the YAML token stream and can be left in an
//! "inconsistent nested-queue state" if a `queues` item lacks a `prio` or two
//! siblings collide on one. This port replaces the scanner with a typed
//! `serde` deserializer (`RawRule`), so a missing `prio` is simply a
//! deserialization error, and a `prio` collision is caught by an explicit
//! post-validation pass over the parsed document — both surface the same
//! "loading fails, engine returns the error response" contract from a single
//! call site ([`load`]) rather than a custom scanner.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

use super::model::{Actions, Conditions, Header, QueueCandidate, Rule, SizeOp};
use super::pattern::Pattern;
use super::time::TimeToken;

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    name: Option<String>,
    #[serde(default)]
    priority: i64,
    default: Option<String>,
    transport: Option<String>,
    #[serde(default)]
    conditions: RawConditions,
    #[serde(default)]
    actions: RawActions,
}

#[derive(Debug, Default, Deserialize)]
struct RawConditions {
    day: Option<String>,
    time: Option<String>,
    ruri: Option<String>,
    header: Option<String>,
    next: Option<String>,
    queues: Option<Vec<RawQueueItem>>,
}

#[derive(Debug, Deserialize)]
struct RawQueueItem {
    uri: String,
    state: String,
    size: String,
    prio: i64,
}

#[derive(Debug, Default, Deserialize)]
struct RawActions {
    add: Option<String>,
    route: Option<String>,
}

/// Parses the rule YAML file at `path` into an ordered `Vec<Rule>`.
///
/// Every rule returned has its runtime fields (`valid`, `hits`, `use_flag`)
/// freshly reset; callers clone this vector per request rather than
/// re-parsing unless [`super::cache::RuleCache`] is in use.
pub fn load(path: &Path) -> AppResult<Vec<Rule>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::RuleFile(format!("could not read {}: {e}", path.display())))?;
    parse_str(&text)
}

pub(crate) fn parse_str(text: &str) -> AppResult<Vec<Rule>> {
    let raw: Vec<RawRule> = serde_yaml::from_str(text)
        .map_err(|e| AppError::RuleFile(format!("invalid rule YAML: {e}")))?;

    raw.into_iter().map(convert).collect()
}

fn convert(raw: RawRule) -> AppResult<Rule> {
    let day = raw
        .conditions
        .day
        .as_deref()
        .map(split_comma)
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.to_uppercase())
        .collect();

    let time = raw
        .conditions
        .time
        .as_deref()
        .map(split_comma)
        .unwrap_or_default()
        .into_iter()
        .map(|s| TimeToken::parse(&s))
        .collect::<AppResult<Vec<_>>>()?;

    let ruri = raw.conditions.ruri.as_deref().map(Pattern::parse);
    let next = raw.conditions.next.as_deref().map(Pattern::parse);

    let header = raw
        .conditions
        .header
        .as_deref()
        .map(parse_name_value_list)
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, Pattern::parse(&value)))
        .collect();

    let queues = raw
        .conditions
        .queues
        .unwrap_or_default()
        .into_iter()
        .map(|q| {
            Ok(QueueCandidate {
                uri: q.uri,
                state: q.state,
                size: parse_size_op(&q.size)?,
                prio: q.prio,
            })
        })
        .collect::<AppResult<Vec<QueueCandidate>>>()?;

    validate_queue_priorities(&raw.id, &queues)?;

    let add = raw
        .actions
        .add
        .as_deref()
        .map(parse_name_value_list)
        .transpose()?
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| Header { name, value })
        .collect();

    let (default_route, default_headers) = match raw.default.as_deref() {
        None => (None, vec![]),
        Some(s) => {
            let mut parts = split_comma(s).into_iter();
            let route = parts.next();
            let headers = parts
                .map(|p| split_name_value(&p))
                .collect::<AppResult<Vec<_>>>()?
                .into_iter()
                .map(|(name, value)| Header { name, value })
                .collect();
            (route, headers)
        }
    };

    Ok(Rule {
        id: raw.id,
        name: raw.name,
        priority: raw.priority,
        transport: raw.transport,
        conditions: Conditions {
            day,
            time,
            ruri,
            next,
            header,
            queues,
        },
        actions: Actions {
            add,
            route: raw.actions.route,
        },
        default_route,
        default_headers,
        valid: true,
        hits: 0,
        use_flag: false,
    })
}

/// A queue list is "inconsistent" (the post-scan analogue of the upstream
/// parser's stuck state) when two candidates collide on `prio` — the
/// ascending iteration order the evaluator depends on would be ambiguous.
fn validate_queue_priorities(rule_id: &str, queues: &[QueueCandidate]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for q in queues {
        if !seen.insert(q.prio) {
            return Err(AppError::RuleFile(format!(
                "rule '{rule_id}': duplicate queue prio {}",
                q.prio
            )));
        }
    }
    Ok(())
}

fn split_comma(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn split_name_value(s: &str) -> AppResult<(String, String)> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| AppError::RuleFile(format!("malformed 'Name: Value' pair: {s}")))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn parse_name_value_list(s: &str) -> AppResult<Vec<(String, String)>> {
    split_comma(s).iter().map(|p| split_name_value(p)).collect()
}

fn parse_size_op(s: &str) -> AppResult<SizeOp> {
    let s = s.trim();
    let op = s
        .chars()
        .next()
        .ok_or_else(|| AppError::RuleFile("empty size requirement".to_string()))?;
    let rest = &s[op.len_utf8()..];
    let n: i64 = rest
        .trim()
        .parse()
        .map_err(|_| AppError::RuleFile(format!("invalid size requirement: {s}")))?;
    match op {
        '<' => Ok(SizeOp::LessThan(n)),
        '>' => Ok(SizeOp::GreaterThan(n)),
        '=' => Ok(SizeOp::Equal(n)),
        _ => Err(AppError::RuleFile(format!(
            "size requirement must start with <, > or =: {s}"
        ))),
    }
}
