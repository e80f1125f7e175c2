//! Bounded retry policies for operations that wait on Nomad to converge.
//!
//! Two shapes are used by the adapters: a fixed number of attempts at a
//! fixed interval (namespace and node pool deletion), and a fixed interval
//! until a deadline (volume creation, plugin health, deployments).

use std::future::Future;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use tracing::debug;

use crate::error::ProviderError;

pub use backoff::Error as RetryError;

/// Default pause between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of attempts, including the first.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;

/// Fixed-interval retry policy with an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub interval: Duration,
    /// Total attempts, including the first one.
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(interval: Duration, attempts: u32) -> Self {
        Self { interval, attempts }
    }

    /// Backoff that allows `attempts - 1` retries.
    pub fn backoff(&self) -> FixedAttempts {
        FixedAttempts {
            interval: self.interval,
            remaining: self.attempts.saturating_sub(1),
        }
    }

    /// Backoff that retries at this policy's interval until `timeout` elapses.
    pub fn until(&self, timeout: Duration) -> UntilDeadline {
        UntilDeadline::new(self.interval, timeout)
    }
}

/// A fixed interval, a fixed number of times.
#[derive(Debug, Clone)]
pub struct FixedAttempts {
    interval: Duration,
    remaining: u32,
}

impl Backoff for FixedAttempts {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.interval)
    }
}

/// A fixed interval until a deadline; the last wait is clipped to it.
#[derive(Debug, Clone)]
pub struct UntilDeadline {
    interval: Duration,
    deadline: Instant,
}

impl UntilDeadline {
    /// Start the clock now.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + timeout,
        }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Wait time for a blocking query, or `None` with under a millisecond
    /// left. Nomad reads `wait=0ms` as its own default wait.
    pub fn blocking_wait(&self) -> Option<Duration> {
        Some(self.remaining()).filter(|wait| wait.as_millis() > 0)
    }
}

impl Backoff for UntilDeadline {
    fn next_backoff(&mut self) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            None
        } else {
            Some(self.interval.min(remaining))
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or `backoff` gives up.
///
/// The operation classifies its own failures with [`RetryError::transient`]
/// and [`RetryError::permanent`]; the last transient error is returned when
/// retries run out.
pub async fn retry<T, B, F, Fut>(what: &str, backoff: B, operation: F) -> Result<T, ProviderError>
where
    B: Backoff,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<ProviderError>>>,
{
    backoff::future::retry_notify(backoff, operation, |err: ProviderError, wait: Duration| {
        debug!(operation = what, error = %err, retry_in = ?wait, "Retrying");
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fixed_attempts_counts_retries() {
        let mut backoff = RetryPolicy::new(Duration::from_millis(1), 3).backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(1)));
        assert_eq!(backoff.next_backoff(), None);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.attempts, 10);
    }

    #[test]
    fn test_deadline_clips_last_wait() {
        let mut backoff = UntilDeadline::new(Duration::from_secs(60), Duration::from_millis(50));
        let wait = backoff.next_backoff().unwrap();
        assert!(wait <= Duration::from_millis(50));
    }

    #[test]
    fn test_blocking_wait_ends_at_deadline() {
        let open = UntilDeadline::new(Duration::from_secs(1), Duration::from_secs(60));
        assert!(open.blocking_wait().unwrap() >= Duration::from_secs(59));

        let passed = UntilDeadline::new(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(passed.blocking_wait(), None);

        let sub_milli = UntilDeadline::new(Duration::from_secs(1), Duration::from_micros(500));
        assert_eq!(sub_milli.blocking_wait(), None);
    }

    #[tokio::test]
    async fn test_retry_stops_after_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(Duration::from_millis(1), 4);

        let result: Result<(), _> = retry("always failing", policy.backoff(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::transient(ProviderError::Unavailable("busy".into())))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_retry_recovers_from_transient_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(Duration::from_millis(1), 5);

        let result = tokio_test::block_on(retry("flaky", policy.backoff(), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(RetryError::transient(ProviderError::Unavailable("busy".into()))),
                n => Ok(n),
            }
        }));

        assert_eq!(tokio_test::assert_ok!(result), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_permanent_error_short_circuits() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(Duration::from_millis(1), 4);

        let result: Result<(), _> = retry("permanent", policy.backoff(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::permanent(ProviderError::Validation("bad".into())))
        })
        .await;

        assert!(matches!(result, Err(ProviderError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
