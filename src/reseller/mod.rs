//! Connectivity reseller integration.
//!
//! # Data Flow
//! ```text
//! caller (proxy route, webhook pipeline, CLI)
//!     → client.rs (token on demand, per-operation retry profile)
//!     → resilience::ResilientExecutor (attempt loop)
//!     → types.rs (typed envelopes out, ResellerError on failure)
//! ```
//!
//! # Design Decisions
//! - The token cache is injected, never global
//! - Upstream raw bodies are logged, never returned to end users

pub mod client;
pub mod token;
pub mod types;

pub use client::{Credentials, ResellerClient, RetryProfiles};
pub use token::{AccessToken, Clock, InMemoryTokenCache, SystemClock, TokenCache};
pub use types::{
    Envelope, Order, OrderRequest, Package, ResellerError, ResellerResult, ResourceId, Sim, Topup,
    TopupRequest, Usage,
};
