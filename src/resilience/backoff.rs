//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the jitter term, as a fraction of the exponential delay.
pub const MAX_JITTER_FRACTION: f64 = 0.3;

/// Source of uniform samples in `[0, 1)` for the jitter term.
pub trait JitterSource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Delay before retrying after the 1-based `attempt` failed.
///
/// `initial * 2^(attempt-1)` plus up to 30% jitter, capped at `max`.
pub fn calculate_backoff(
    attempt: u32,
    initial: Duration,
    max: Duration,
    jitter: &dyn JitterSource,
) -> Duration {
    if attempt == 0 || initial.is_zero() {
        return Duration::ZERO;
    }

    let initial_ms = initial.as_secs_f64() * 1000.0;
    let max_ms = max.as_secs_f64() * 1000.0;

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let exponential = initial_ms * 2f64.powi(exponent);
    let sample = jitter.sample().clamp(0.0, 1.0);
    let jittered = exponential + sample * MAX_JITTER_FRACTION * exponential;
    let delay_ms = jittered.min(max_ms);

    Duration::from_nanos((delay_ms * 1_000_000.0).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_backoff_calculation() {
        let no_jitter = FixedJitter(0.0);
        assert_eq!(calculate_backoff(1, ms(100), ms(2000), &no_jitter), ms(100));
        assert_eq!(calculate_backoff(2, ms(100), ms(2000), &no_jitter), ms(200));
        assert_eq!(calculate_backoff(3, ms(100), ms(2000), &no_jitter), ms(400));
        assert_eq!(calculate_backoff(10, ms(100), ms(1000), &no_jitter), ms(1000));
    }

    #[test]
    fn test_jitter_adds_up_to_thirty_percent() {
        assert_eq!(calculate_backoff(1, ms(1000), ms(10_000), &FixedJitter(0.5)), ms(1150));
        assert_eq!(calculate_backoff(2, ms(1000), ms(10_000), &FixedJitter(1.0)), ms(2600));
    }

    #[test]
    fn test_jitter_is_capped() {
        assert_eq!(calculate_backoff(4, ms(1000), ms(8500), &FixedJitter(0.9)), ms(8500));
    }

    #[test]
    fn test_random_delay_stays_in_bounds() {
        let initial = ms(1000);
        let max = ms(10_000);
        for attempt in 1..=6u32 {
            for _ in 0..50 {
                let delay = calculate_backoff(attempt, initial, max, &ThreadRngJitter);
                let floor = (initial * 2u32.pow(attempt - 1)).min(max);
                assert!(delay >= floor, "attempt {} gave {:?}", attempt, delay);
                assert!(delay <= max, "attempt {} gave {:?}", attempt, delay);
            }
        }
    }

    #[test]
    fn test_initial_above_max_saturates() {
        assert_eq!(calculate_backoff(1, ms(5000), ms(2000), &FixedJitter(0.0)), ms(2000));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        assert_eq!(
            calculate_backoff(u32::MAX, ms(1000), ms(10_000), &FixedJitter(0.3)),
            ms(10_000)
        );
    }

    #[test]
    fn test_zero_attempt_or_delay() {
        assert_eq!(calculate_backoff(0, ms(1000), ms(10_000), &ThreadRngJitter), Duration::ZERO);
        assert_eq!(calculate_backoff(3, Duration::ZERO, ms(10_000), &ThreadRngJitter), Duration::ZERO);
    }
}
