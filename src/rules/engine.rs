//! Orchestrates loading, evaluation, selection, and response synthesis for
//! one inbound request — the rule engine's single entry point.

use chrono::Timelike;
use sqlx::SqlitePool;

use super::eval::{self, RequestCtx};
use super::headers::RequestHeaders;
use super::model::Rule;
use super::{response, select};

/// Evaluates every rule in `rules` against the request described by
/// `ruri`/`next`/`headers`, selects a winner, and returns the §4.7 JSON
/// response body — success or the fixed error shape, never an `Err`: every
/// failure path in the spec degrades to the error JSON rather than
/// propagating (SPEC_FULL.md §7).
pub async fn route_request(
    mut rules: Vec<Rule>,
    ruri: &str,
    next: &str,
    headers: &RequestHeaders,
    pool: &SqlitePool,
) -> serde_json::Value {
    let now = chrono::Local::now();
    let weekday = now.format("%a").to_string().to_uppercase();
    let time = chrono::NaiveTime::from_hms_opt(now.hour(), now.minute(), now.second())
        .unwrap_or_else(|| chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());

    let ctx = RequestCtx {
        ruri,
        next,
        headers,
        weekday: &weekday,
        time,
    };

    let mut queue_targets: Vec<Option<String>> = Vec::with_capacity(rules.len());
    for rule in rules.iter_mut() {
        queue_targets.push(eval::evaluate(rule, &ctx, pool).await);
    }

    let Some(idx) = select::select_rule(&mut rules) else {
        return response::error();
    };

    let queue_target = queue_targets[idx].take();
    let rule = &mut rules[idx];

    match response::assemble_route(rule, queue_target, next) {
        Some(target) => response::success(&target, &rule.actions.add),
        None => response::error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parse::parse_str;

    async fn pool() -> SqlitePool {
        let dir = tempfile::tempdir().unwrap();
        crate::db::create_pool(&dir.path().join("q.db")).await.unwrap()
    }

    #[tokio::test]
    async fn higher_priority_rule_wins_and_its_route_is_used() {
        let yaml = r#"
- id: r1
  priority: 1
  conditions:
    ruri: "_@h"
  actions:
    route: sip:low@h
- id: r2
  priority: 5
  conditions:
    ruri: "_@h"
  actions:
    route: sip:high@h
"#;
        let rules = parse_str(yaml).unwrap();
        let db = pool().await;
        let headers = RequestHeaders::parse("");
        let body = route_request(rules, "sip:a@h", "sip:next@h", &headers, &db).await;
        assert_eq!(body["target"], "sip:high@h");
        assert_eq!(body["statusCode"], 200);
    }

    #[tokio::test]
    async fn no_matching_rule_yields_error_shape() {
        let yaml = "- id: r1\n  priority: 1\n  conditions:\n    ruri: \"sip:only@h\"\n";
        let rules = parse_str(yaml).unwrap();
        let db = pool().await;
        let headers = RequestHeaders::parse("");
        let body = route_request(rules, "sip:other@h", "sip:next@h", &headers, &db).await;
        assert_eq!(body["statusCode"], 500);
    }

    #[tokio::test]
    async fn queue_fallback_uses_default_route_and_headers() {
        let yaml = r#"
- id: r1
  priority: 1
  default: "sip:fb@h, X-Fallback: true"
  conditions:
    queues:
      - uri: sip:q1@h
        state: active
        size: ">0"
        prio: 1
      - uri: sip:q2@h
        state: active
        size: ">0"
        prio: 2
"#;
        let rules = parse_str(yaml).unwrap();
        let db = pool().await;
        sqlx::query("INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, 'inactive', 'd', 0, 0)")
            .bind("sip:q1@h")
            .execute(&db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO queues (uri, state, dequeuer, max, length) VALUES (?, 'inactive', 'd', 0, 0)")
            .bind("sip:q2@h")
            .execute(&db)
            .await
            .unwrap();

        let headers = RequestHeaders::parse("");
        let body = route_request(rules, "sip:a@h", "sip:next@h", &headers, &db).await;
        assert_eq!(body["target"], "sip:fb@h");
        assert_eq!(body["additionalHeaders"][0]["name"], "X-Fallback:");
        assert_eq!(body["additionalHeaders"][0]["value"], "true");
    }
}
