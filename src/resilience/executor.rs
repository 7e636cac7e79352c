//! Resilient call executor.
//!
//! Runs one outbound request through the attempt loop:
//!
//! ```text
//! for attempt in 1..=max_retries+1:
//!     Transport::send
//!       Err  -> NetworkError   -> retry or fail "Network error: {message}"
//!       Ok   -> safe_json_parse
//!                 Ok  -> success
//!                 Err -> classify by status -> retry or fail with parser error
//!     retry: observer, log, sleep(backoff), continue
//! ```
//!
//! Ordinary failures never surface as `Err` from [`ResilientExecutor::execute`];
//! they come back inside [`ExecutionResult`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::http::request::RequestDescriptor;
use crate::http::response::{safe_json_parse, ResponseError};
use crate::http::transport::{ReqwestTransport, Transport};
use crate::observability::metrics;
use crate::resilience::backoff::{JitterSource, ThreadRngJitter};
use crate::resilience::retries::{FailureKind, RetryPolicy};
use crate::resilience::timeouts::{within, Sleeper, TokioSleeper};

/// Why a resilient call did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// No response was received on the final attempt.
    #[error("Network error: {0}")]
    Network(String),

    /// A response was received on the final attempt but rejected by the parser.
    #[error("{error}")]
    Response { status: u16, error: ResponseError },

    /// The overall deadline elapsed before the call finished.
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The attempt loop ended without a verdict.
    #[error("Max retries exceeded")]
    RetriesExhausted,
}

impl CallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Response { status, .. } => FailureKind::Response(*status),
            _ => FailureKind::Network,
        }
    }

    /// Truncated raw body, when a response was received.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            CallError::Response { error, .. } => Some(error.raw_text()),
            _ => None,
        }
    }

    /// Text handed to the retry observer: the bare transport message, or the
    /// parser's error.
    fn retry_reason(&self) -> String {
        match self {
            CallError::Network(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Outcome of a whole resilient call. Built once, never mutated.
#[derive(Debug)]
pub struct ExecutionResult<T> {
    pub outcome: Result<T, CallError>,
    /// Attempts actually started, including the first.
    pub attempts: u32,
    /// Status of the last response received, if the last attempt got one.
    pub last_status: Option<u16>,
}

impl<T> ExecutionResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|e| e.to_string())
    }

    pub fn raw_text(&self) -> Option<&str> {
        self.outcome.as_ref().err().and_then(CallError::raw_text)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExecutionResult<U> {
        ExecutionResult {
            outcome: self.outcome.map(f),
            attempts: self.attempts,
            last_status: self.last_status,
        }
    }

    /// Escalate a failed call as an error value.
    pub fn into_result(self) -> Result<T, ExecutionError> {
        let attempts = self.attempts;
        let last_status = self.last_status;
        self.outcome.map_err(|error| ExecutionError {
            error,
            attempts,
            last_status,
        })
    }
}

/// A failed resilient call, for callers that propagate with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct ExecutionError {
    pub error: CallError,
    pub attempts: u32,
    pub last_status: Option<u16>,
}

impl ExecutionError {
    pub fn raw_text(&self) -> Option<&str> {
        self.error.raw_text()
    }
}

#[derive(Debug, Default)]
struct Progress {
    attempts: u32,
    last_status: Option<u16>,
}

/// Retries calls over a [`Transport`] according to a [`RetryPolicy`].
///
/// Holds no per-call state; one executor may serve any number of concurrent calls.
#[derive(Clone)]
pub struct ResilientExecutor<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    jitter: Arc<dyn JitterSource>,
}

impl<T: Transport> ResilientExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            sleeper: TokioSleeper,
            jitter: Arc::new(ThreadRngJitter),
        }
    }
}

impl<T: Transport, S: Sleeper> ResilientExecutor<T, S> {
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> ResilientExecutor<T, S2> {
        ResilientExecutor {
            transport: self.transport,
            sleeper,
            jitter: self.jitter,
        }
    }

    pub fn with_jitter(mut self, jitter: impl JitterSource + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `request` until it yields a `R`, fails for good, or the budget runs out.
    pub async fn execute<R: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        policy: &RetryPolicy,
    ) -> ExecutionResult<R> {
        let mut progress = Progress::default();
        let finished = within(policy.deadline, self.run_attempts(request, policy, &mut progress)).await;

        match finished {
            Some(result) => result,
            None => {
                let deadline = policy.deadline.unwrap_or_default();
                tracing::warn!(
                    url = %request.url,
                    attempts = progress.attempts,
                    deadline_ms = deadline.as_millis() as u64,
                    "Resilient call abandoned at deadline"
                );
                ExecutionResult {
                    outcome: Err(CallError::DeadlineExceeded(deadline)),
                    attempts: progress.attempts,
                    last_status: progress.last_status,
                }
            }
        }
    }

    async fn run_attempts<R: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
        policy: &RetryPolicy,
        progress: &mut Progress,
    ) -> ExecutionResult<R> {
        let mut last_error = None;

        for attempt in 1..=policy.total_attempts() {
            progress.attempts = attempt;

            let failure = match self.transport.send(request).await {
                Ok(response) => {
                    progress.last_status = Some(response.status);
                    match safe_json_parse::<R>(&response) {
                        Ok(data) => {
                            return ExecutionResult {
                                outcome: Ok(data),
                                attempts: attempt,
                                last_status: Some(response.status),
                            };
                        }
                        Err(error) => CallError::Response {
                            status: response.status,
                            error,
                        },
                    }
                }
                Err(e) => {
                    progress.last_status = None;
                    CallError::Network(e.0)
                }
            };

            let kind = failure.kind();
            if !policy.should_retry(attempt, kind) {
                return ExecutionResult {
                    outcome: Err(failure),
                    attempts: attempt,
                    last_status: progress.last_status,
                };
            }

            let delay = policy.delay_for(attempt, self.jitter.as_ref());
            let reason = failure.retry_reason();
            tracing::warn!(
                url = %request.url,
                attempt,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %reason,
                "Retrying after transient failure"
            );
            metrics::record_retry(kind.label());
            policy.observer().on_retry(attempt, &reason, delay);

            self.sleeper.sleep(delay).await;
            last_error = Some(failure);
        }

        ExecutionResult {
            outcome: Err(last_error.unwrap_or(CallError::RetriesExhausted)),
            attempts: policy.total_attempts(),
            last_status: progress.last_status,
        }
    }
}

/// One-shot resilient call over a shared `reqwest` client.
pub async fn resilient_fetch<R: DeserializeOwned>(
    client: &reqwest::Client,
    request: &RequestDescriptor,
    policy: &RetryPolicy,
) -> ExecutionResult<R> {
    ResilientExecutor::new(ReqwestTransport::new(client.clone()))
        .execute(request, policy)
        .await
}
