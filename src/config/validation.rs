//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and the reseller base URL
//! - Validate retry profile ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - `initial_delay_ms > max_delay_ms` is legal (every delay saturates at the
//!   cap) and only logged

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("reseller.base_url: {0}")]
    InvalidBaseUrl(String),

    #[error("reseller.retry.{profile}: {reason}")]
    InvalidRetryProfile { profile: &'static str, reason: &'static str },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.log_level: unknown level '{0}'")]
    UnknownLogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Check a parsed configuration. Pure apart from warning logs.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("server.request_timeout_secs"));
    }

    match url::Url::parse(&config.reseller.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidBaseUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::InvalidBaseUrl(e.to_string())),
    }
    if config.reseller.attempt_timeout_secs == 0 {
        errors.push(ValidationError::Zero("reseller.attempt_timeout_secs"));
    }

    for (profile, retry) in config.reseller.retry.named() {
        if retry.initial_delay_ms == 0 {
            errors.push(ValidationError::InvalidRetryProfile {
                profile,
                reason: "initial_delay_ms must be positive",
            });
        }
        if retry.max_delay_ms == 0 {
            errors.push(ValidationError::InvalidRetryProfile {
                profile,
                reason: "max_delay_ms must be positive",
            });
        }
        if retry.deadline_ms == Some(0) {
            errors.push(ValidationError::InvalidRetryProfile {
                profile,
                reason: "deadline_ms must be positive when set",
            });
        }
        if retry.initial_delay_ms > retry.max_delay_ms {
            tracing::warn!(
                profile,
                initial_delay_ms = retry.initial_delay_ms,
                max_delay_ms = retry.max_delay_ms,
                "Initial delay exceeds max delay; every backoff will use the cap"
            );
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
