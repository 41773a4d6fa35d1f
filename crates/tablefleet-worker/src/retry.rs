//! Fixed-backoff retry policy with cooperative cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How long to wait between attempts. Retries run until cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retry forever with a fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Start counting attempts under this policy.
    pub fn attempts(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 1,
        }
    }
}

/// Attempt counter for one retry loop.
///
/// ```ignore
/// let mut backoff = policy.attempts();
/// loop {
///     if try_once().await.is_ok() { break; }
///     if !backoff.wait(&cancel).await { break; }
/// }
/// ```
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// The attempt about to run, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Sleep before the next attempt. Returns `false` as soon as `cancel`
    /// fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.policy.delay) => {
                self.attempt += 1;
                true
            }
        }
    }
}
