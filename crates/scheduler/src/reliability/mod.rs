//! Reliability patterns
//!
//! This module provides:
//! - [`RetryPolicy`] - Configurable retry with exponential backoff
//! - [`RateLimiter`] - Token-bucket limiter for outbound calls

mod rate_limit;
mod retry;

pub use rate_limit::{RateLimiter, TokenBucket};
pub use retry::RetryPolicy;
