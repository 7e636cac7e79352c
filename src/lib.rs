//! eSIM reseller gateway library.
//!
//! Resilient access to a connectivity reseller API (token caching, retries
//! with capped exponential backoff, safe response parsing), an authenticated
//! proxy for browser sessions and a payment webhook that turns paid checkouts
//! into eSIM orders or top-ups.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod reseller;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use reseller::ResellerClient;
pub use resilience::{resilient_fetch, ExecutionResult, RetryPolicy};
