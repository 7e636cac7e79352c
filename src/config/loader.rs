//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override file values. Secrets belong here.
pub const ENV_RESELLER_API_URL: &str = "RESELLER_API_URL";
pub const ENV_RESELLER_CLIENT_ID: &str = "RESELLER_CLIENT_ID";
pub const ENV_RESELLER_CLIENT_SECRET: &str = "RESELLER_CLIENT_SECRET";
pub const ENV_GATEWAY_API_KEY: &str = "GATEWAY_API_KEY";
pub const ENV_PAYMENT_WEBHOOK_SECRET: &str = "PAYMENT_WEBHOOK_SECRET";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply environment overrides, then validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GatewayConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Defaults plus environment overrides, for running without a file.
pub fn from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay non-empty values returned by `lookup` onto `config`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_RESELLER_API_URL) {
        config.reseller.base_url = v;
    }
    if let Some(v) = get(ENV_RESELLER_CLIENT_ID) {
        config.reseller.client_id = v;
    }
    if let Some(v) = get(ENV_RESELLER_CLIENT_SECRET) {
        config.reseller.client_secret = v;
    }
    if let Some(v) = get(ENV_GATEWAY_API_KEY) {
        config.server.api_key = v;
    }
    if let Some(v) = get(ENV_PAYMENT_WEBHOOK_SECRET) {
        config.payments.webhook_secret = v;
    }
}
