//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound HTTP server.
    pub server: ServerConfig,

    /// Connectivity reseller API.
    pub reseller: ResellerConfig,

    /// Payment webhook and order storage.
    pub payments: PaymentConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Bearer key browser sessions present to the proxy routes.
    #[serde(skip_serializing)]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 60,
            // WARNING: This is a placeholder! Set GATEWAY_API_KEY in production.
            api_key: String::new(),
        }
    }
}

/// Reseller API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResellerConfig {
    /// API root, e.g. "https://partners-api.example.com/v2".
    pub base_url: String,

    /// OAuth client ID. Usually supplied via `RESELLER_CLIENT_ID`.
    pub client_id: String,

    /// OAuth client secret. Only ever supplied via `RESELLER_CLIENT_SECRET`.
    #[serde(skip_serializing)]
    pub client_secret: String,

    /// Seconds shaved off the token lifetime before it is considered expired.
    pub token_refresh_margin_secs: u64,

    /// Per-attempt HTTP timeout in seconds.
    pub attempt_timeout_secs: u64,

    /// Retry profiles per operation family.
    pub retry: RetryProfilesConfig,
}

impl Default for ResellerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            token_refresh_margin_secs: 60,
            attempt_timeout_secs: 30,
            retry: RetryProfilesConfig::default(),
        }
    }
}

/// Retry configuration for one kind of call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Retry on HTTP 5xx.
    pub retry_on_5xx: bool,

    /// Retry when no response was received.
    pub retry_on_network_error: bool,

    /// Optional overall budget for the call in milliseconds, sleeps included.
    pub deadline_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            retry_on_5xx: true,
            retry_on_network_error: true,
            deadline_ms: None,
        }
    }
}

impl RetryConfig {
    fn profile(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay_ms,
            max_delay_ms,
            ..Self::default()
        }
    }
}

/// Retry profiles used by the reseller client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryProfilesConfig {
    /// Token acquisition.
    pub token: RetryConfig,

    /// Read-only lookups (packages, orders, top-ups, usage, proxy).
    pub read: RetryConfig,

    /// Order creation.
    pub order: RetryConfig,

    /// Top-up creation.
    pub topup: RetryConfig,
}

impl Default for RetryProfilesConfig {
    fn default() -> Self {
        Self {
            token: RetryConfig::profile(2, 1000, 5000),
            read: RetryConfig::profile(2, 1000, 10_000),
            order: RetryConfig::profile(3, 1500, 10_000),
            topup: RetryConfig::profile(3, 1500, 10_000),
        }
    }
}

impl RetryProfilesConfig {
    /// Profiles with their names, for validation and logging.
    pub fn named(&self) -> [(&'static str, &RetryConfig); 4] {
        [
            ("token", &self.token),
            ("read", &self.read),
            ("order", &self.order),
            ("topup", &self.topup),
        ]
    }
}

/// Payment webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Enable the payment webhook route.
    pub enabled: bool,

    /// Shared secret expected in `X-Webhook-Secret`.
    #[serde(skip_serializing)]
    pub webhook_secret: String,

    /// JSON file the order store persists to. In-memory only when unset.
    pub store_path: Option<String>,

    /// Currency used when the event does not carry one.
    pub default_currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_secret: String::new(),
            store_path: None,
            default_currency: "EUR".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let profiles = RetryProfilesConfig::default();
        assert_eq!(profiles.token.max_retries, 2);
        assert_eq!(profiles.token.max_delay_ms, 5000);
        assert_eq!(profiles.order.initial_delay_ms, 1500);
        assert_eq!(profiles.topup.max_retries, 3);
        assert!(profiles.read.retry_on_5xx);
    }

    #[test]
    fn test_minimal_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [reseller]
            base_url = "https://reseller.test/v2"

            [reseller.retry.order]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.reseller.base_url, "https://reseller.test/v2");
        assert_eq!(config.reseller.retry.order.max_retries, 5);
        // Unspecified fields of a partially-given profile fall back to RetryConfig defaults.
        assert_eq!(config.reseller.retry.order.initial_delay_ms, 1000);
        assert_eq!(config.reseller.retry.token.max_retries, 2);
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = GatewayConfig::default();
        config.reseller.client_secret = "hunter2".to_string();
        config.payments.webhook_secret = "whsec".to_string();

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("whsec"));
    }
}
