//! Condition-evaluation pipeline (SPEC_FULL.md §4.4).
//!
//! Each step below mutates `rule.valid`/`rule.hits` in place and the queue
//! step may additionally rewrite `rule.actions.add` (the fallback-headers
//! substitution). Steps 1-5 always run; step 6 (the queue predicate) is
//! skipped once the rule has already gone invalid, matching "a condition
//! producing FALSE sets valid=false; only then is the queue predicate
//! skipped".

use chrono::NaiveTime;
use sqlx::SqlitePool;

use crate::db::query;

use super::headers::RequestHeaders;
use super::model::Rule;
use super::pattern::Pattern;

pub struct RequestCtx<'a> {
    pub ruri: &'a str,
    pub next: &'a str,
    pub headers: &'a RequestHeaders,
    pub weekday: &'a str,
    pub time: NaiveTime,
}

/// Runs the full condition pipeline over `rule`, returning the queue-stage
/// target URI if one was chosen (used by [`super::response::assemble_route`]).
pub async fn evaluate(rule: &mut Rule, ctx: &RequestCtx<'_>, pool: &SqlitePool) -> Option<String> {
    rule.reset_runtime();

    eval_ruri(rule, ctx.ruri);
    eval_next(rule, ctx.next);
    eval_weekday(rule, ctx.weekday);
    eval_time(rule, ctx.time);
    eval_headers(rule, ctx.headers);

    if !rule.valid {
        return None;
    }

    eval_queue(rule, ctx, pool).await
}

fn eval_ruri(rule: &mut Rule, ruri: &str) {
    match &rule.conditions.ruri {
        None => rule.hits += 1,
        Some(pattern) => {
            if pattern.matches(ruri) {
                rule.hits += 1;
            } else {
                rule.valid = false;
            }
        }
    }
}

/// Extracts the `sip:`/`sips:`/`tel:` scheme portion of a next-hop URI,
/// stopping at the first `:` encountered after the scheme's own colon (a
/// password or port separator) or at a closing `>` (the URI was wrapped in
/// angle brackets), whichever comes first.
pub fn extract_next_scheme(next: &str) -> Option<String> {
    const SCHEMES: [&str; 3] = ["sips:", "sip:", "tel:"];

    let (start, scheme_len) = SCHEMES
        .iter()
        .filter_map(|s| next.find(s).map(|idx| (idx, s.len())))
        .min_by_key(|(idx, _)| *idx)?;

    let after_scheme = start + scheme_len;
    let rest = &next[after_scheme..];
    let end = rest
        .find([':', '>'])
        .map(|o| after_scheme + o)
        .unwrap_or(next.len());

    Some(next[start..end].to_string())
}

fn eval_next(rule: &mut Rule, next: &str) {
    match &rule.conditions.next {
        None => rule.hits += 1,
        Some(pattern) => {
            let scheme_part = extract_next_scheme(next).unwrap_or_default();
            if pattern.matches(&scheme_part) {
                rule.hits += 1;
            } else {
                rule.valid = false;
            }
        }
    }
}

fn eval_weekday(rule: &mut Rule, today: &str) {
    if rule.conditions.day.is_empty() {
        rule.hits += 1;
        return;
    }
    if rule.conditions.day.iter().any(|d| d.contains(today)) {
        rule.hits += 1;
    } else {
        rule.valid = false;
    }
}

fn eval_time(rule: &mut Rule, now: NaiveTime) {
    if super::time::matches_any(&rule.conditions.time, now) {
        rule.hits += 1;
    } else {
        rule.valid = false;
    }
}

/// Consecutive `(name, pattern)` pairs sharing a name are OR'd together
/// (any pattern matching any value for that name passes the group);
/// distinct names are AND'd. Every pattern that actually matched within a
/// passing evaluation contributes one hit.
fn eval_headers(rule: &mut Rule, headers: &RequestHeaders) {
    if rule.conditions.header.is_empty() {
        return;
    }

    let mut groups: Vec<(&str, Vec<&Pattern>)> = vec![];
    for (name, pattern) in &rule.conditions.header {
        match groups.last_mut() {
            Some((last_name, patterns)) if *last_name == name => patterns.push(pattern),
            _ => groups.push((name, vec![pattern])),
        }
    }

    let mut all_groups_pass = true;
    let mut match_count = 0u32;
    for (name, patterns) in &groups {
        let values: Vec<&str> = headers.values(name).collect();
        let mut group_pass = false;
        for pattern in patterns {
            if values.iter().any(|v| pattern.matches(v)) {
                group_pass = true;
                match_count += 1;
            }
        }
        if !group_pass {
            all_groups_pass = false;
        }
    }

    if all_groups_pass {
        rule.hits += match_count;
    } else {
        rule.valid = false;
    }
}

async fn eval_queue(rule: &mut Rule, ctx: &RequestCtx<'_>, pool: &SqlitePool) -> Option<String> {
    rule.hits += 1;

    let mut candidates = rule.conditions.queues.clone();
    candidates.sort_by_key(|c| c.prio);

    for candidate in &candidates {
        if let Ok(Some(state)) = query::lookup(pool, &candidate.uri).await {
            if state.state == candidate.state && candidate.size.matches(state.length) {
                return Some(candidate.uri.clone());
            }
        }
    }

    // The lookup key is normalized the same way as the next-hop condition
    // (step 2): the original's `get_target` calls `extract_sipuri(in->next)`
    // for the `sqlite_QUERY` key but still uses the raw `in->next` as the
    // resulting target URI once the lookup passes.
    if let Some(next_uri) = extract_next_scheme(ctx.next) {
        if let Ok(Some(state)) = query::lookup(pool, &next_uri).await {
            if state.state == "active" {
                return Some(ctx.next.to_string());
            }
        }
    }

    if let Some(route) = rule.default_route.clone() {
        if !rule.default_headers.is_empty() {
            rule.actions.add = rule.default_headers.clone();
        }
        return Some(route);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_scheme_stops_at_angle_bracket() {
        assert_eq!(
            extract_next_scheme("<sip:next@host>;foo=bar").as_deref(),
            Some("sip:next@host")
        );
    }

    #[test]
    fn next_scheme_stops_at_second_colon() {
        assert_eq!(
            extract_next_scheme("sip:user:pass@host").as_deref(),
            Some("sip:user")
        );
    }

    #[test]
    fn next_scheme_handles_tel() {
        assert_eq!(extract_next_scheme("tel:+43123;q=1").as_deref(), Some("tel:+43123;q=1"));
    }

    #[test]
    fn next_scheme_none_when_no_known_scheme() {
        assert_eq!(extract_next_scheme("not-a-uri"), None);
    }

    async fn pool() -> SqlitePool {
        let dir = tempfile::tempdir().unwrap();
        crate::db::create_pool(&dir.path().join("q.db")).await.unwrap()
    }

    /// The implicit next-hop fallback (step 6, "try the request's next hop
    /// with an implicit active check") must normalize an angle-bracketed
    /// `next` the same way the next-hop condition does, so it can still
    /// match a stored row keyed on the bare uri.
    #[tokio::test]
    async fn implicit_next_hop_fallback_matches_angle_bracketed_uri() {
        use crate::rules::model::{Actions, Conditions};

        let db = pool().await;
        sqlx::query("INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, 'active', 'd', 0, 0)")
            .bind("sip:next@host")
            .execute(&db)
            .await
            .unwrap();

        let mut rule = Rule {
            id: "r".into(),
            name: None,
            priority: 0,
            transport: None,
            conditions: Conditions::default(),
            actions: Actions { add: vec![], route: None },
            default_route: None,
            default_headers: vec![],
            valid: true,
            hits: 0,
            use_flag: false,
        };

        let headers = RequestHeaders::default();
        let ctx = RequestCtx {
            ruri: "sip:a@h",
            next: "<sip:next@host>;foo=bar",
            headers: &headers,
            weekday: "MON",
            time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
        };

        let target = eval_queue(&mut rule, &ctx, &db).await;
        assert_eq!(target.as_deref(), Some("<sip:next@host>;foo=bar"));
    }
}
