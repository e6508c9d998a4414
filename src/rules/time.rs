//! Parsing and evaluation of a rule's `time` condition: a comma-separated
//! list of `TIME hh:mm` / `RANGE hh:mm-hh:mm` tokens, OR-combined.

use chrono::NaiveTime;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeToken {
    /// Passes at exactly this minute.
    At(NaiveTime),
    /// Passes for `now` anywhere in `[start, end]`; wraps past midnight when
    /// `end < start`.
    Range { start: NaiveTime, end: NaiveTime },
}

impl TimeToken {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let raw = raw.trim();
        if let Some(hhmm) = raw.strip_prefix("TIME ").map(str::trim) {
            return Ok(TimeToken::At(parse_hhmm(hhmm)?));
        }
        if let Some(rest) = raw.strip_prefix("RANGE ").map(str::trim) {
            let (a, b) = rest
                .split_once('-')
                .ok_or_else(|| AppError::RuleFile(format!("malformed time range: {raw}")))?;
            return Ok(TimeToken::Range {
                start: parse_hhmm(a.trim())?,
                end: parse_hhmm(b.trim())?,
            });
        }
        Err(AppError::RuleFile(format!("unrecognised time token: {raw}")))
    }

    /// True if `now` satisfies this token. `RANGE a-b` with `b < a` is taken
    /// to wrap past midnight, i.e. it accepts `now >= a || now <= b`.
    pub fn matches(&self, now: NaiveTime) -> bool {
        match self {
            TimeToken::At(t) => now.hour_minute() == t.hour_minute(),
            TimeToken::Range { start, end } => {
                if end >= start {
                    now >= *start && now <= *end
                } else {
                    now >= *start || now <= *end
                }
            }
        }
    }
}

trait HourMinute {
    fn hour_minute(&self) -> (u32, u32);
}

impl HourMinute for NaiveTime {
    fn hour_minute(&self) -> (u32, u32) {
        use chrono::Timelike;
        (self.hour(), self.minute())
    }
}

fn parse_hhmm(s: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| AppError::RuleFile(format!("invalid hh:mm '{s}': {e}")))
}

/// OR-combines a rule's time tokens against `now`. An empty list is always a
/// pass (the rule carries no time restriction).
pub fn matches_any(tokens: &[TimeToken], now: NaiveTime) -> bool {
    tokens.is_empty() || tokens.iter().any(|t| t.matches(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_hhmm(s).unwrap()
    }

    #[test]
    fn exact_time_matches_only_that_minute() {
        let tok = TimeToken::parse("TIME 08:30").unwrap();
        assert!(tok.matches(t("08:30")));
        assert!(!tok.matches(t("08:31")));
    }

    #[test]
    fn simple_range_matches_inclusive_bounds() {
        let tok = TimeToken::parse("RANGE 08:00-17:00").unwrap();
        assert!(tok.matches(t("08:00")));
        assert!(tok.matches(t("17:00")));
        assert!(tok.matches(t("12:00")));
        assert!(!tok.matches(t("17:01")));
        assert!(!tok.matches(t("07:59")));
    }

    #[test]
    fn wrapping_range_spans_midnight() {
        let tok = TimeToken::parse("RANGE 22:00-06:00").unwrap();
        assert!(tok.matches(t("23:30")));
        assert!(tok.matches(t("02:00")));
        assert!(!tok.matches(t("12:00")));
    }

    /// Property: if a > b, RANGE a-b accepts exactly the complement of
    /// RANGE b-a (every non-boundary minute belongs to exactly one).
    #[test]
    fn wrap_is_complement_of_non_wrapping_range() {
        let wrapping = TimeToken::parse("RANGE 22:00-06:00").unwrap();
        let non_wrapping = TimeToken::parse("RANGE 06:00-22:00").unwrap();
        for h in 0..24 {
            for m in [0, 15, 30, 45] {
                let now = NaiveTime::from_hms_opt(h, m, 0).unwrap();
                let in_wrap = wrapping.matches(now);
                let in_plain = non_wrapping.matches(now);
                assert!(
                    in_wrap != in_plain || (now == t("22:00") || now == t("06:00")),
                    "minute {now} matched both or neither"
                );
            }
        }
    }
}
