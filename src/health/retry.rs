// ABOUTME: Bounded retry utilities shared by every probe.
// ABOUTME: Attempt-bounded retry with capped exponential backoff, and deadline-bounded polling.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How often and how long to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub interval: Duration,
    /// Factor applied to the delay after each attempt (1 keeps it fixed).
    pub backoff: u32,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            backoff: 1,
            max_interval: interval,
        }
    }

    pub fn exponential(attempts: u32, interval: Duration, max_interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            backoff: 2,
            max_interval,
        }
    }

    /// Delay after the given attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1).saturating_pow(attempt.saturating_sub(1));
        self.interval
            .saturating_mul(factor)
            .min(self.max_interval.max(self.interval))
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    pub attempts: u32,
    /// Last failure; `None` when the deadline expired before any attempt finished.
    pub last: Option<E>,
}

/// Run `op` until it returns `Ok` or the policy's attempts run out.
pub async fn retry_until<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => last = Some(e),
        }
        if attempt < attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(RetryError { attempts, last })
}

/// Run `op` every `interval` until it returns `Ok` or `timeout` elapses.
///
/// An attempt still running at the deadline is abandoned.
pub async fn poll_until_deadline<T, E, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0;
    let mut last = None;

    loop {
        attempts += 1;
        match tokio::time::timeout_at(deadline, op(attempts)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last = Some(e),
            Err(_) => return Err(RetryError { attempts, last }),
        }

        let now = Instant::now();
        if now + interval >= deadline {
            return Err(RetryError { attempts, last });
        }
        tokio::time::sleep(interval).await;
    }
}
