//! Backoff for transient failures

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// How often, and how far apart, an operation is re-run while it keeps
/// failing with errors the caller classifies as transient.
///
/// ```
/// use inventio_scheduler::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential().with_max_attempts(3).with_jitter(0.0);
/// assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    first_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    /// Fraction of each delay randomly added or removed.
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Three attempts, doubling from 1s up to 30s, 10% jitter.
    pub fn exponential() -> Self {
        Self {
            max_attempts: 3,
            first_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Same delay between every attempt, no jitter.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            first_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Total attempts including the first, never below one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before `attempt` (1-based). The first attempt starts at once.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let delay = (self.first_delay.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());

        let delay = if self.jitter > 0.0 && delay > 0.0 {
            let spread = delay * self.jitter;
            (delay + rand::thread_rng().gen_range(-spread..spread)).max(0.0)
        } else {
            delay
        };

        Duration::try_from_secs_f64(delay).unwrap_or(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with an error `is_transient`
    /// rejects, or the attempts run out. The last error is returned as is.
    pub async fn retry<T, E, F, Fut>(
        &self,
        is_transient: impl Fn(&E) -> bool,
        mut operation: F,
    ) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}
