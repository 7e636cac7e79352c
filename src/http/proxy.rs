//! Authenticated reseller proxy routes.
//!
//! The browser never talks to the reseller directly: it names an endpoint and
//! the gateway relays it with the server-side token and retry policy.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::server::AppState;
use crate::reseller::ResellerError;

#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// `{ success, data?, error? }`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

type Reply = (StatusCode, Json<ProxyResponse>);

fn reply(status: StatusCode, body: ProxyResponse) -> Reply {
    (status, Json(body))
}

/// Upstream 4xx/5xx statuses are mirrored; anything else is a bad gateway.
pub fn upstream_status(last_status: Option<u16>) -> StatusCode {
    last_status
        .filter(|s| (400..600).contains(s))
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

fn parse_method(method: &str) -> Option<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

/// `POST /api/reseller`.
pub async fn reseller_proxy(
    State(state): State<AppState>,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Reply {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return reply(StatusCode::BAD_REQUEST, ProxyResponse::failure(rejection.body_text()));
        }
    };

    let Some(method) = parse_method(&request.method) else {
        return reply(
            StatusCode::BAD_REQUEST,
            ProxyResponse::failure(format!("Unsupported method '{}'", request.method)),
        );
    };

    tracing::debug!(endpoint = %request.endpoint, method = %method, "Proxying reseller call");
    match state
        .reseller
        .forward(&request.endpoint, method, request.body.as_ref())
        .await
    {
        Ok(result) => {
            let status = upstream_status(result.last_status);
            match result.outcome {
                Ok(data) => reply(StatusCode::OK, ProxyResponse::ok(data)),
                Err(e) => reply(status, ProxyResponse::failure(e.to_string())),
            }
        }
        Err(e @ ResellerError::InvalidEndpoint(_)) => {
            reply(StatusCode::BAD_REQUEST, ProxyResponse::failure(e.to_string()))
        }
        Err(e) => {
            // Token acquisition failed; the caller's request was never sent.
            reply(StatusCode::BAD_GATEWAY, ProxyResponse::failure(e.to_string()))
        }
    }
}

/// `GET /api/topups/{iccid}`.
pub async fn topups(State(state): State<AppState>, Path(iccid): Path<String>) -> Reply {
    match state.reseller.topups(&iccid).await {
        Ok(data) => reply(StatusCode::OK, ProxyResponse::ok(data)),
        Err(e @ ResellerError::InvalidIdentifier(_)) => {
            reply(StatusCode::BAD_REQUEST, ProxyResponse::failure(e.to_string()))
        }
        Err(e) => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            ProxyResponse::failure(format!("Failed to fetch top-up data: {}", e)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_mapping() {
        assert_eq!(upstream_status(Some(404)), StatusCode::NOT_FOUND);
        assert_eq!(upstream_status(Some(503)), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(upstream_status(Some(200)), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream_status(None), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(parse_method("get"), Some(Method::GET));
        assert_eq!(parse_method("Delete"), Some(Method::DELETE));
        assert_eq!(parse_method("TRACE"), None);
    }

    #[test]
    fn test_request_defaults_to_get() {
        let r: ProxyRequest = serde_json::from_str(r#"{"endpoint":"/packages"}"#).unwrap();
        assert_eq!(r.method, "GET");
        assert!(r.body.is_none());
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let json = serde_json::to_value(ProxyResponse::failure("nope")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "nope" }));
    }
}
