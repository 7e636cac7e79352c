//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the order store (reloading persisted orders)
//! - Build the reseller client from configuration
//! - Assemble the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Missing secrets are allowed but logged; the affected routes reject everything

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{GatewayConfig, PaymentConfig};
use crate::http::transport::TransportError;
use crate::http::HttpServer;
use crate::payments::{InMemoryOrderStore, StoreError};
use crate::reseller::ResellerClient;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("HTTP client: {0}")]
    Client(#[from] TransportError),

    #[error("order store: {0}")]
    Store(#[from] StoreError),
}

/// In-memory store, reloaded from `store_path` when configured.
pub fn open_store(config: &PaymentConfig) -> Result<InMemoryOrderStore, StoreError> {
    match &config.store_path {
        Some(path) => InMemoryOrderStore::load_from_file(Path::new(path)),
        None => Ok(InMemoryOrderStore::new(None)),
    }
}

/// Build every subsystem the server needs, in dependency order.
pub fn build_server(config: GatewayConfig) -> Result<HttpServer, StartupError> {
    if config.server.api_key.is_empty() {
        tracing::warn!("No gateway API key configured; proxy routes will reject every request");
    }
    if config.payments.enabled && config.payments.webhook_secret.is_empty() {
        tracing::warn!("No webhook secret configured; payment webhooks will be rejected");
    }
    if config.reseller.client_id.is_empty() || config.reseller.client_secret.is_empty() {
        tracing::warn!("Reseller credentials incomplete; token requests will fail");
    }

    let store = open_store(&config.payments)?;
    let reseller = ResellerClient::from_config(&config.reseller)?;

    tracing::info!(
        reseller = %config.reseller.base_url,
        persisted = config.payments.store_path.is_some(),
        "Subsystems initialized"
    );
    Ok(HttpServer::new(config, Arc::new(reseller), Arc::new(store)))
}
