// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Retrying-call helper with exponential backoff.
//!
//! With the default policy attempt `i` that fails waits roughly
//! `base_delay * 2^(i-1)` before attempt `i + 1`; with jitter enabled the wait is
//! drawn uniformly from `[0, delay]`. No wait follows the last attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub jitter: bool,
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Doubling backoff with full jitter and no cap.
    #[must_use]
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
            multiplier: 2,
            jitter: true,
            max_delay: None,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        let mut delay = self.base_delay.saturating_mul(factor);
        if let Some(cap) = self.max_delay {
            delay = delay.min(cap);
        }
        if self.jitter {
            delay = delay.mul_f64(fastrand::f64());
        }
        delay
    }
}

/// Returned when every attempt failed.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Runs `operation` until it succeeds or `policy.max_attempts` attempts have failed.
///
/// `operation` receives the 1-based attempt number. On success the value is
/// returned together with the number of attempts it took.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<(T, u32), RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "Attempt {}/{} failed: {}, retrying in {} ms",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::exponential(max_attempts, Duration::from_millis(1)).with_jitter(false)
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100)).with_jitter(false);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_respects_cap() {
        let policy = RetryPolicy::exponential(10, Duration::from_secs(1))
            .with_jitter(false)
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(60), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::exponential(200, Duration::from_secs(1)).with_jitter(false);
        assert_eq!(
            policy.delay_for(100),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(100));
        for attempt in 1..=4 {
            let ceiling = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            for _ in 0..50 {
                assert!(policy.delay_for(attempt) <= ceiling);
            }
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let result: Result<(u8, u32), RetryError<String>> =
            retry(&fast_policy(3), |_| async { Ok(7) }).await;
        let (value, attempts) = result.expect("should succeed");
        assert_eq!(value, 7);
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32), RetryError<String>> = retry(&fast_policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;

        let err = result.expect_err("should give up");
        assert_eq!(err.attempts, 3);
        assert_eq!(err.last_error, "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "gave up after 3 attempts: boom");
    }

    #[tokio::test]
    async fn test_flaky_operation_takes_k_plus_one_attempts() {
        let k = 2;
        let calls = AtomicU32::new(0);
        let result = retry(&fast_policy(5), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt <= k {
                    Err(format!("failure {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        let (value, attempts) = result.expect("should recover");
        assert_eq!(value, k + 1);
        assert_eq!(attempts, k + 1);
        assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _ = retry(&fast_policy(0), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("nope") }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
