//! Outbound request descriptors and inbound request IDs.
//!
//! # Responsibilities
//! - Describe one outbound call (URL, method, headers, encoded body)
//! - Encode JSON and form bodies once, before the first attempt
//! - Generate a request ID for every inbound request (UUID v4)
//!
//! # Design Decisions
//! - Descriptors are immutable once built; every retry replays the same bytes
//! - Idempotency keys are attached by the caller, never regenerated per attempt

use axum::http::{HeaderValue, Request};
use reqwest::Method;
use serde::Serialize;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the inbound request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying an idempotency key on mutating calls.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// One outbound call, replayed verbatim on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Append a header. Later duplicates are sent as additional values.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn accept_json(self) -> Self {
        self.header("Accept", "application/json")
    }

    pub fn idempotency_key(self, key: &str) -> Self {
        self.header(IDEMPOTENCY_KEY_HEADER, key)
    }

    /// Serialize `body` as JSON and set the matching content type.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        let encoded = serde_json::to_string(body)?;
        self.body = Some(encoded);
        Ok(self.header("Content-Type", "application/json"))
    }

    /// Encode `pairs` as `application/x-www-form-urlencoded`.
    pub fn form<'a, I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body = Some(encoded);
        self.header("Content-Type", "application/x-www-form-urlencoded")
    }

    /// First value of a header, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Generates UUID v4 request IDs for the inbound request-id layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_sets_content_type() {
        let req = RequestDescriptor::post("http://reseller/orders")
            .json(&serde_json::json!({ "package_id": "pkg-1", "quantity": 1 }))
            .unwrap();

        assert_eq!(req.method, Method::POST);
        assert_eq!(req.header_value("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["package_id"], "pkg-1");
    }

    #[test]
    fn test_form_body_is_urlencoded() {
        let req = RequestDescriptor::post("http://reseller/token").form([
            ("client_id", "abc"),
            ("client_secret", "s&cret"),
            ("grant_type", "client_credentials"),
        ]);

        assert_eq!(
            req.body.as_deref(),
            Some("client_id=abc&client_secret=s%26cret&grant_type=client_credentials")
        );
        assert_eq!(
            req.header_value("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_bearer_and_idempotency_headers() {
        let req = RequestDescriptor::get("http://reseller/orders/1")
            .bearer("tok")
            .idempotency_key("order-1-2-abc");

        assert_eq!(req.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(req.header_value("idempotency-key"), Some("order-1-2-abc"));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let mut maker = MakeRequestUuidV4;
        let request = Request::new(());
        let a = maker.make_request_id(&request).unwrap();
        let b = maker.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }
}
