//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the reseller:
//!     → executor.rs (attempt loop over a Transport)
//!     → http::response (safe JSON parsing of every received response)
//!     → retries.rs (is this failure retryable? budget left?)
//!     → backoff.rs (exponential delay + jitter, capped)
//!     → timeouts.rs (sleep between attempts, optional overall deadline)
//! Mutating calls carry a key from idempotency.rs, generated once per operation.
//! ```
//!
//! # Design Decisions
//! - Connection errors and 5xx are retryable; everything else is final
//! - Ordinary failures are values (ExecutionResult), never panics
//! - Sleep and randomness are injectable so tests stay fast and exact

pub mod backoff;
pub mod executor;
pub mod idempotency;
pub mod retries;
pub mod timeouts;

pub use backoff::{calculate_backoff, FixedJitter, JitterSource, ThreadRngJitter};
pub use executor::{resilient_fetch, CallError, ExecutionError, ExecutionResult, ResilientExecutor};
pub use idempotency::generate_idempotency_key;
pub use retries::{FailureKind, NoopObserver, RetryObserver, RetryPolicy};
pub use timeouts::{Sleeper, TokioSleeper};
