//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters for calls, retries, fulfilments)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Raw upstream bodies are logged server-side only, never returned to clients
//! - Request ID flows through inbound spans

pub mod logging;
pub mod metrics;
