//! Parses the incoming request's header block: base64-decoded,
//! CRLF-separated `Name: Value` lines (SPEC_FULL.md §4.4, §6).

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    pub fn decode(base64_body: &str) -> AppResult<Self> {
        let bytes = STANDARD
            .decode(base64_body)
            .map_err(|e| AppError::Protocol(format!("invalid base64 request body: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| AppError::Protocol(format!("request body is not utf-8: {e}")))?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let entries = text
            .split("\r\n")
            .flat_map(|line| line.split('\n'))
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    return None;
                }
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();
        Self { entries }
    }

    /// All values for `name`, case-insensitively, in declaration order.
    pub fn values(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
