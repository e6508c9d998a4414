use std::collections::HashMap;

use serde::Deserialize;

use crate::db::queue::Service;

pub const WS_SUBPROTOCOL: &str = "dec112-mgmt";

pub const GET_HEALTH: &str = r#"{"method":"get_health"}"#;
pub const SUBSCRIBE_HEALTH: &str = r#"{"method":"subscribe_health"}"#;
pub const UNSUBSCRIBE_HEALTH: &str = r#"{"method":"unsubscribe_health"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator {
    GetHealth,
    SubscribeHealth,
    UnsubscribeHealth,
    HealthNotify,
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFrame {
    method: Option<String>,
    event: Option<String>,
    health: Option<RawHealth>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawHealth {
    sip: Option<RawSip>,
    services: Option<HashMap<String, Service>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawSip {
    uri: Option<String>,
    #[allow(dead_code)]
    name: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFrame {
    pub dequeuer: Option<String>,
    pub services: Vec<Service>,
}

/// Parses an inbound WS frame, returning its discriminator plus whatever
/// health payload it carried.
///
/// The source's frame parser (`queue_JSONmethod`) contains an assignment
/// where an equality check was meant (`code = 200` inside the `if`
/// condition), with the net effect that the health payload is extracted
/// for *every* recognised `method`/`event`, not only the ones that
/// logically carry one. This port keeps that observed behaviour rather
/// than "fixing" it: any recognised discriminator attempts to pull
/// `health.sip`/`health.services` out of the frame. See SPEC_FULL.md §9.
pub fn parse_frame(raw: &str) -> Option<(Discriminator, ParsedFrame)> {
    let frame: RawFrame = serde_json::from_str(raw).ok()?;

    let discriminator = match frame.method.as_deref().or(frame.event.as_deref()) {
        Some("get_health") => Discriminator::GetHealth,
        Some("subscribe_health") => Discriminator::SubscribeHealth,
        Some("unsubscribe_health") => Discriminator::UnsubscribeHealth,
        Some("health") => Discriminator::HealthNotify,
        _ => Discriminator::Other,
    };

    if discriminator == Discriminator::Other {
        return Some((discriminator, ParsedFrame::default()));
    }

    let mut parsed = ParsedFrame::default();

    if let Some(health) = frame.health {
        if let Some(sip) = health.sip {
            parsed.dequeuer = sip.uri;
            if let Some(state) = sip.state {
                if state != "registered" {
                    tracing::warn!(dequeuer = ?parsed.dequeuer, %state, "dequeuer not registered");
                }
            }
        }
        if let Some(services) = health.services {
            parsed.services = services.into_values().collect();
        }
    }

    Some((discriminator, parsed))
}

/// Percent-encodes `#` as `%23`, the only escaping the configured
/// websocket URL needs (source: `conf_read`'s `HASHTAG`/`HASHTAGENC`).
pub fn encode_ws_url(raw: &str) -> String {
    raw.replace('#', "%23")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_percent_encoded() {
        assert_eq!(encode_ws_url("ws://host/path#frag"), "ws://host/path%23frag");
        assert_eq!(encode_ws_url("ws://host/path"), "ws://host/path");
    }

    #[test]
    fn get_health_response_is_parsed() {
        let raw = r#"{"method":"get_health","code":200,"health":{"sip":{"uri":"sip:dq@h","name":"dq","state":"registered"},"services":{"a":{"queue_uri":"sip:q1@h","active":1,"active_calls":3}}}}"#;
        let (disc, parsed) = parse_frame(raw).unwrap();
        assert_eq!(disc, Discriminator::GetHealth);
        assert_eq!(parsed.dequeuer.as_deref(), Some("sip:dq@h"));
        assert_eq!(parsed.services.len(), 1);
    }

    #[test]
    fn unsubscribe_response_has_no_dequeuer_but_still_parses_health_if_present() {
        let raw = r#"{"method":"unsubscribe_health"}"#;
        let (disc, parsed) = parse_frame(raw).unwrap();
        assert_eq!(disc, Discriminator::UnsubscribeHealth);
        assert!(parsed.dequeuer.is_none());
    }

    #[test]
    fn unknown_method_is_other() {
        let raw = r#"{"method":"something_else"}"#;
        let (disc, _) = parse_frame(raw).unwrap();
        assert_eq!(disc, Discriminator::Other);
    }
}
