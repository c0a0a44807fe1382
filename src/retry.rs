//! Bounded retry with a fixed delay between attempts

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempts run out. Returns the last error together with the number of
/// attempts made.
pub async fn retry<T, E, F, Fut, R>(
    policy: RetryPolicy,
    retryable: R,
    mut op: F,
) -> Result<T, (E, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !retryable(&e) => return Err((e, attempt)),
            Err(e) if attempt >= policy.attempts => {
                warn!("Giving up after {} attempts: {}", attempt, e);
                return Err((e, attempt));
            }
            Err(e) => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt, policy.attempts, e, policy.delay
                );
                sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_gives_up_after_exact_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry(fast(5), |_| true, || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("busy") }
        })
        .await;

        assert_eq!(result, Err(("busy", 5)));
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = retry(fast(5), |_| true, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err("busy")
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = retry(fast(5), |e: &&str| *e == "busy", || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>("denied") }
        })
        .await;

        assert_eq!(result, Err(("denied", 1)));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_waits_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(20));
        let start = Instant::now();
        let _: Result<(), _> = retry(policy, |_| true, || async { Err::<(), _>("busy") }).await;
        // Two sleeps between three attempts
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
