//! Token bucket rate limiting
//!
//! Continuous refill based on elapsed time. [`RateLimiter`] wraps a bucket
//! for async callers: `acquire` polls the bucket every `check_every` until a
//! token is available.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Token bucket with fractional refill
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum tokens the bucket can hold
    capacity: f64,

    /// Current number of tokens
    tokens: f64,

    /// Tokens added per second
    refill_per_sec: f64,

    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket holding `capacity` tokens, refilled at `refill_per_sec`
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: refill_per_sec.max(0.0),
            last_refill: Instant::now(),
        }
    }

    /// Try to consume one token
    pub fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Whole tokens available right now
    pub fn available_tokens(&mut self) -> u32 {
        self.refill();
        self.tokens.floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

/// Async, shareable rate limiter
///
/// # Example
///
/// ```ignore
/// let limiter = RateLimiter::new(5.0, 10, Duration::from_millis(100));
/// limiter.acquire().await;
/// client.invoke(&prompt, &config).await?;
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    check_every: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, max_bucket_size: u32, check_every: Duration) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(max_bucket_size, requests_per_second)),
            check_every: check_every.max(Duration::from_millis(1)),
        }
    }

    /// Take a token without waiting
    pub fn try_acquire(&self) -> bool {
        self.bucket.lock().try_consume()
    }

    /// Wait until a token is available, then take it
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            tokio::time::sleep(self.check_every).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_basic() {
        let mut bucket = TokenBucket::new(3, 1.0);

        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.capacity(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bucket_refill_is_capped() {
        let mut bucket = TokenBucket::new(10, 5.0);
        for _ in 0..10 {
            assert!(bucket.try_consume());
        }
        assert_eq!(bucket.available_tokens(), 0);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(bucket.available_tokens(), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.available_tokens(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new(5.0, 2, Duration::from_millis(100));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Third token arrives after 200ms at 5 tokens/s
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_millis(400));
    }
}
