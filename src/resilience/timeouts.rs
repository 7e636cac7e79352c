//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole resilient call (attempts and sleeps) by an optional deadline
//! - Provide the sleep seam used between attempts
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - On expiry the in-flight future is dropped, not awaited

use std::future::Future;
use std::time::Duration;

/// Suspends between attempts.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await
    }
}

/// Run `fut` to completion, or give up after `deadline` if one is set.
///
/// Returns `None` when the deadline elapsed first.
pub async fn within<F: Future>(deadline: Option<Duration>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_deadline_runs_to_completion() {
        assert_eq!(within(None, async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            1
        };
        assert_eq!(within(Some(Duration::from_secs(1)), slow).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_waits() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(250)).await;
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
