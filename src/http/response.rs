//! Response safety parsing.
//!
//! # Responsibilities
//! - Turn a fully-read upstream response into a typed payload or a
//!   diagnosable failure
//! - Detect gateway error pages (HTML) served where JSON was expected
//! - Keep a bounded raw-body snippet for server-side logs
//!
//! # Design Decisions
//! - Error statuses are never parsed; their body is diagnostic only
//! - Snippets are truncated by characters, not bytes

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Maximum number of characters of raw body kept for diagnostics.
pub const RAW_SNIPPET_CHARS: usize = 500;

/// An upstream response whose body has been read exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: canonical_reason(status).to_string(),
            content_type: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body).with_content_type("application/json")
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn declares_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }
}

/// Why a received response could not be turned into the expected payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Non-2xx status. The body was not parsed.
    #[error("HTTP {status}: {status_text}")]
    Status {
        status: u16,
        status_text: String,
        raw_text: String,
    },

    /// A success status carrying a markup document.
    #[error("Received HTML instead of JSON (possible gateway error)")]
    Html { raw_text: String },

    /// The body is not valid JSON for the expected type.
    #[error("JSON parse error: {message}")]
    Json { message: String, raw_text: String },
}

impl ResponseError {
    /// Truncated raw body for diagnostics.
    pub fn raw_text(&self) -> &str {
        match self {
            ResponseError::Status { raw_text, .. }
            | ResponseError::Html { raw_text }
            | ResponseError::Json { raw_text, .. } => raw_text,
        }
    }
}

/// Parse a response body as JSON without ever panicking on bad input.
pub fn safe_json_parse<T: DeserializeOwned>(response: &RawResponse) -> Result<T, ResponseError> {
    if !response.is_success() {
        return Err(ResponseError::Status {
            status: response.status,
            status_text: response.status_text.clone(),
            raw_text: snippet(&response.body),
        });
    }

    if !response.declares_json() && looks_like_html(&response.body) {
        return Err(ResponseError::Html {
            raw_text: snippet(&response.body),
        });
    }

    serde_json::from_str(&response.body).map_err(|e| ResponseError::Json {
        message: e.to_string(),
        raw_text: snippet(&response.body),
    })
}

fn looks_like_html(body: &str) -> bool {
    body.trim().starts_with('<') || body.contains("<!DOCTYPE")
}

/// First [`RAW_SNIPPET_CHARS`] characters of `body`.
pub fn snippet(body: &str) -> String {
    body.chars().take(RAW_SNIPPET_CHARS).collect()
}

/// Reason phrase for a status code, empty when unknown.
pub fn canonical_reason(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
