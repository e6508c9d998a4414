use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

use super::protocol::encode_ws_url;

#[derive(Debug, Deserialize)]
struct RawConfig {
    websockets: Vec<String>,
}

/// Reads the aggregator's YAML config file (source: `conf_read`). The one
/// recognized key, `websockets`, lists the WebSocket URLs to monitor, one
/// per rule-engine instance. Returns each URL paired with its `#`-encoded
/// form, ready to dial.
pub fn read(path: &Path) -> AppResult<Vec<(String, String)>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("could not read config {}: {e}", path.display()))
    })?;

    let cfg: RawConfig = serde_yaml::from_str(&text)
        .map_err(|e| AppError::Config(format!("invalid config {}: {e}", path.display())))?;

    if cfg.websockets.is_empty() {
        return Err(AppError::Config("no websockets configured".into()));
    }

    Ok(cfg
        .websockets
        .into_iter()
        .map(|url| {
            let encoded = encode_ws_url(&url);
            (url, encoded)
        })
        .collect())
}
