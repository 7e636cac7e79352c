//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound (to the reseller):
//!     request.rs (RequestDescriptor)
//!     → transport.rs (one network attempt, body read once)
//!     → response.rs (safe JSON parsing, gateway-page detection)
//!
//! Inbound (browser and payment processor):
//!     server.rs (Axum setup, middleware, request IDs)
//!     → auth.rs (session key / webhook secret)
//!     → proxy.rs (reseller proxy routes)
//!     → webhook.rs (payment fulfilment)
//! ```

pub mod auth;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;
pub mod webhook;

pub use request::{RequestDescriptor, X_REQUEST_ID};
pub use response::{safe_json_parse, RawResponse, ResponseError};
pub use server::HttpServer;
pub use transport::{ReqwestTransport, Transport, TransportError};
