//! Route assembly (SPEC_FULL.md §4.5) and response synthesis (§4.7).

use serde::Serialize;
use serde_json::json;

use crate::error::ERR_TARGET;

use super::model::{Header, Rule};

#[derive(Debug, Clone, Serialize)]
pub struct HeaderOut {
    pub name: String,
    pub value: String,
}

impl From<&Header> for HeaderOut {
    fn from(h: &Header) -> Self {
        HeaderOut {
            name: format!("{}:", h.name),
            value: h.value.clone(),
        }
    }
}

/// Picks the outgoing URI for a rule that survived evaluation and mutates
/// its `actions.add` list with a `History-Info` header and/or a
/// `;transport=` suffix as needed. Returns `None` (and the caller should
/// treat the rule as invalid) if no URI can be produced at all.
pub fn assemble_route(rule: &mut Rule, queue_target: Option<String>, next: &str) -> Option<String> {
    let mut chosen = queue_target
        .or_else(|| rule.actions.route.clone())
        .or_else(|| (!next.is_empty()).then(|| next.to_string()))?;

    if chosen != next {
        rule.actions.add.push(Header {
            name: "History-Info".to_string(),
            value: format!("{chosen};index=1.0"),
        });
    }

    if !chosen.contains(";transport=") {
        if let Some(transport) = &rule.transport {
            chosen.push_str(&format!(";transport={transport}"));
        }
    }

    Some(chosen)
}

/// The fixed JSON response shape, success or failure (§4.7).
pub fn success(target: &str, headers: &[Header]) -> serde_json::Value {
    let headers: Vec<HeaderOut> = headers.iter().map(HeaderOut::from).collect();
    json!({
        "target": target,
        "statusCode": 200,
        "additionalHeaders": headers,
        "additionalBodyParts": [],
        "tindex": 0,
        "tlabel": 0,
    })
}

pub fn error() -> serde_json::Value {
    json!({
        "target": ERR_TARGET,
        "statusCode": 500,
        "additionalHeaders": [],
        "additionalBodyParts": [],
        "tindex": 0,
        "tlabel": 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::{Actions, Conditions};

    fn bare_rule() -> Rule {
        Rule {
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
        }
    }

    #[test]
    fn queue_target_wins_over_route_and_next() {
        let mut rule = bare_rule();
        rule.actions.route = Some("sip:route@h".into());
        let chosen = assemble_route(&mut rule, Some("sip:q@h".into()), "sip:next@h");
        assert_eq!(chosen.as_deref(), Some("sip:q@h"));
    }

    #[test]
    fn falls_back_to_route_then_next() {
        let mut rule = bare_rule();
        let chosen = assemble_route(&mut rule, None, "sip:next@h");
        assert_eq!(chosen.as_deref(), Some("sip:next@h"));
    }

    #[test]
    fn no_target_anywhere_is_none() {
        let mut rule = bare_rule();
        let chosen = assemble_route(&mut rule, None, "");
        assert!(chosen.is_none());
    }

    #[test]
    fn history_info_added_when_rewritten() {
        let mut rule = bare_rule();
        assemble_route(&mut rule, Some("sip:q@h".into()), "sip:next@h");
        let hi = rule.actions.add.iter().find(|h| h.name == "History-Info").unwrap();
        assert_eq!(hi.value, "sip:q@h;index=1.0");
    }

    #[test]
    fn no_history_info_when_target_equals_next() {
        let mut rule = bare_rule();
        assemble_route(&mut rule, None, "sip:next@h");
        assert!(rule.actions.add.is_empty());
    }

    #[test]
    fn transport_suffix_appended_once() {
        let mut rule = bare_rule();
        rule.transport = Some("udp".into());
        let chosen = assemble_route(&mut rule, Some("sip:q@h".into()), "sip:next@h").unwrap();
        assert_eq!(chosen, "sip:q@h;transport=udp");
    }

    #[test]
    fn transport_not_duplicated_if_already_present() {
        let mut rule = bare_rule();
        rule.transport = Some("udp".into());
        let chosen = assemble_route(&mut rule, Some("sip:q@h;transport=tcp".into()), "sip:next@h").unwrap();
        assert_eq!(chosen, "sip:q@h;transport=tcp");
    }

    #[test]
    fn header_name_gets_trailing_colon() {
        let headers = vec![Header { name: "X-Foo".into(), value: "bar".into() }];
        let body = success("sip:q@h", &headers);
        assert_eq!(body["additionalHeaders"][0]["name"], "X-Foo:");
    }

    #[test]
    fn error_shape_has_fixed_target_and_500() {
        let body = error();
        assert_eq!(body["statusCode"], 500);
        assert_eq!(body["target"], ERR_TARGET);
    }
}
