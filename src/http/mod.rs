//! The rule engine's inbound HTTP boundary (SPEC_FULL.md §6, "Rule engine
//! HTTP").

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use crate::rules::cache::RuleCache;
use crate::rules::engine;
use crate::rules::headers::RequestHeaders;
use crate::rules::model::Rule;
use crate::rules::{parse, response};

pub struct HttpState {
    pub pool: SqlitePool,
    pub rules_path: PathBuf,
    /// `None` means "re-parse the YAML file on every request" (the source's
    /// default behaviour, kept as the default here too; see SPEC_FULL.md §9).
    pub cache: Option<RuleCache>,
}

pub type SharedState = Arc<HttpState>;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub ruri: String,
    /// base64(CRLF-separated `Name: Value` headers).
    pub request: String,
    pub next: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/prf/req", post(handle_route_request))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any path other than `/api/v1/prf/req` returns the static error JSON
/// (SPEC_FULL.md §6).
async fn fallback() -> impl IntoResponse {
    chunked_json(response::error())
}

async fn handle_route_request(
    State(state): State<SharedState>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    let rules = match load_rules(&state).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::error!(error = %e, "failed to load rule file");
            return chunked_json(response::error());
        }
    };

    let headers = match RequestHeaders::decode(&req.request) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(error = %e, "malformed request header block");
            return chunked_json(response::error());
        }
    };

    let body = engine::route_request(rules, &req.ruri, &req.next, &headers, &state.pool).await;
    chunked_json(body)
}

async fn load_rules(state: &HttpState) -> crate::error::AppResult<Vec<Rule>> {
    match &state.cache {
        Some(cache) => cache.rules().await,
        None => parse::load(&state.rules_path),
    }
}

/// Builds the response with an explicit `Transfer-Encoding: chunked`
/// header, matching SPEC_FULL.md §6's wire contract, rather than the
/// `Content-Length` framing `Json` would pick by default.
fn chunked_json(body: serde_json::Value) -> Response<Body> {
    let bytes = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
