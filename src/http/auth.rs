//! Inbound credential checks.
//!
//! Browser sessions present the gateway key as a bearer token; the payment
//! processor presents a shared secret header.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::http::proxy::ProxyResponse;
use crate::http::server::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// `Authorization: Bearer <expected>`. An unset key matches nothing.
pub fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match presented {
        Some(token) => !expected.is_empty() && constant_time_eq(token.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

/// Shared secret header sent by the payment processor. An unset secret matches nothing.
pub fn webhook_secret_matches(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok());
    match presented {
        Some(secret) => !expected.is_empty() && constant_time_eq(secret.as_bytes(), expected.as_bytes()),
        None => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects requests without the gateway key.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if bearer_matches(request.headers(), &state.config.server.api_key) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(ProxyResponse::failure("Unauthorized")),
    )
        .into_response()
}
