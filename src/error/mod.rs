use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Default target used whenever the rule engine cannot produce a real one.
pub const ERR_TARGET: &str = "sip:unknown@domain.invalid";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rule file error: {0}")]
    RuleFile(String),

    #[error("websocket protocol error: {0}")]
    Protocol(String),

    #[error("no valid rule found")]
    NoValidRule,
}

pub type AppResult<T> = Result<T, AppError>;

/// Maps any `AppError` reaching the HTTP boundary onto the fixed error
/// response shape from the rule engine's response synthesis step, never a
/// bare 500 page. The engine's own logic never actually returns `Err` past
/// the handler (every failure path degrades to the error JSON internally),
/// but this exists so the boundary is total regardless.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        let body = json!({
            "target": ERR_TARGET,
            "statusCode": 500,
            "additionalHeaders": [],
            "additionalBodyParts": [],
            "tindex": 0,
            "tlabel": 0,
        });
        (StatusCode::OK, Json(body)).into_response()
    }
}
