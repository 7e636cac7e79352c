//! Retry policy.
//!
//! # Responsibilities
//! - Carry the retry budget and backoff bounds for one kind of call
//! - Classify a failed attempt as retryable or final
//! - Notify an observer before every backoff sleep
//!
//! # Design Decisions
//! - Connection errors and 5xx are retryable, each behind its own switch
//! - 4xx and bad bodies on 2xx are final: retrying cannot fix them
//! - Mutating calls are protected by idempotency keys, not by refusing to retry

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::RetryConfig;
use crate::resilience::backoff::{calculate_backoff, JitterSource};

/// What went wrong in a single attempt, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No response was received.
    Network,
    /// A response was received but not accepted. Carries its status.
    Response(u16),
}

impl FailureKind {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Response(status) if (500..600).contains(status) => "server_error",
            FailureKind::Response(_) => "response",
        }
    }
}

/// Called before each backoff sleep. Must not influence control flow.
pub trait RetryObserver: Send + Sync {
    fn on_retry(&self, attempt: u32, error: &str, delay: Duration);
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _attempt: u32, _error: &str, _delay: Duration) {}
}

impl<F> RetryObserver for F
where
    F: Fn(u32, &str, Duration) + Send + Sync,
{
    fn on_retry(&self, attempt: u32, error: &str, delay: Duration) {
        self(attempt, error, delay)
    }
}

/// Retry budget and backoff bounds for one call.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub retry_on_5xx: bool,
    pub retry_on_network_error: bool,
    /// Overall budget for the call, sleeps included.
    pub deadline: Option<Duration>,
    observer: Arc<dyn RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            retry_on_5xx: true,
            retry_on_network_error: true,
            deadline: None,
            observer: Arc::new(NoopObserver),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_retry_on_5xx(mut self, enabled: bool) -> Self {
        self.retry_on_5xx = enabled;
        self
    }

    pub fn with_retry_on_network_error(mut self, enabled: bool) -> Self {
        self.retry_on_network_error = enabled;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_observer(mut self, observer: impl RetryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn observer(&self) -> &dyn RetryObserver {
        self.observer.as_ref()
    }

    /// First try plus retries.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether a failure of this kind may be retried at all.
    pub fn is_retryable(&self, failure: FailureKind) -> bool {
        match failure {
            FailureKind::Network => self.retry_on_network_error,
            FailureKind::Response(status) => self.retry_on_5xx && (500..600).contains(&status),
        }
    }

    /// Whether the 1-based `attempt` that just failed should be followed by another.
    pub fn should_retry(&self, attempt: u32, failure: FailureKind) -> bool {
        attempt <= self.max_retries && self.is_retryable(failure)
    }

    pub fn delay_for(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        calculate_backoff(attempt, self.initial_delay, self.max_delay, jitter)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("retry_on_5xx", &self.retry_on_5xx)
            .field("retry_on_network_error", &self.retry_on_network_error)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            retry_on_5xx: config.retry_on_5xx,
            retry_on_network_error: config.retry_on_network_error,
            deadline: config.deadline_ms.map(Duration::from_millis),
            observer: Arc::new(NoopObserver),
        }
    }
}
