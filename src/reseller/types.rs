//! Reseller API payloads and error definitions.
//!
//! Only the fields the gateway reads are modelled; everything else is kept
//! as raw JSON so nothing is lost when relaying to the browser.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::resilience::ExecutionError;

/// Errors that can occur during reseller operations.
#[derive(Debug, Error)]
pub enum ResellerError {
    /// The resilient call failed for good.
    #[error("{operation} failed: {source}")]
    Call {
        operation: &'static str,
        source: ExecutionError,
    },

    /// The request body could not be encoded.
    #[error("failed to encode {operation} request: {source}")]
    Encode {
        operation: &'static str,
        source: serde_json::Error,
    },

    /// An identifier that would escape its path segment.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A proxied endpoint that is not a plain API path.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

impl ResellerError {
    /// Upstream status of the last attempt, when one was received.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ResellerError::Call { source, .. } => source.last_status,
            _ => None,
        }
    }

    /// Attempts spent before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            ResellerError::Call { source, .. } => source.attempts,
            _ => 0,
        }
    }
}

/// Result type for reseller operations.
pub type ResellerResult<T> = Result<T, ResellerError>;

/// `{ "data": ..., "meta": { "message": ... } }`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Meta {
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn message(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.message.as_deref())
    }
}

/// Identifier the reseller sends either as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResourceId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Number(n) => write!(f, "{}", n),
            ResourceId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Package {
    pub id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub package_id: String,
    pub quantity: u32,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OrderRequest {
    /// A single SIM for `package_id`.
    pub fn sim(package_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            quantity: 1,
            kind: "sim".to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Sim {
    pub iccid: String,
    #[serde(default)]
    pub qrcode_url: Option<String>,
    #[serde(default)]
    pub direct_apple_installation_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Order {
    pub id: ResourceId,
    #[serde(default)]
    pub sims: Vec<Sim>,
    /// Data allowance label, e.g. "5 GB".
    #[serde(default)]
    pub data: Option<String>,
}

/// Body of `POST /orders/topups`.
#[derive(Debug, Clone, Serialize)]
pub struct TopupRequest {
    pub iccid: String,
    pub package_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Topup {
    #[serde(default)]
    pub id: Option<ResourceId>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Topup {
    /// Reseller reference for the top-up: its id, else its code.
    pub fn reference(&self) -> Option<String> {
        self.id
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.code.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Usage {
    #[serde(default)]
    pub remaining: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub expired_at: Option<String>,
    #[serde(default)]
    pub is_unlimited: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}
