//! Leaky-bucket rate limiting, per (peer, message type).

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub burst: u32,
    pub refill_per_sec: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            burst: 20,
            refill_per_sec: 5.0,
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: HashMap<(String, String), Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Returns `true` if the message may proceed, consuming one token.
    pub fn allow(&mut self, peer: &str, message_type: &str) -> bool {
        let key = (peer.to_string(), message_type.to_string());
        let now = Instant::now();
        let bucket = self.buckets.entry(key).or_insert_with(|| Bucket {
            tokens: self.config.burst as f64,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_sec)
            .min(self.config.burst as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_consumed_then_blocks() {
        let mut limiter = RateLimiter::new(RateLimiterConfig {
            burst: 3,
            refill_per_sec: 0.0,
        });
        assert!(limiter.allow("p1", "NONCE_SHARE"));
        assert!(limiter.allow("p1", "NONCE_SHARE"));
        assert!(limiter.allow("p1", "NONCE_SHARE"));
        assert!(!limiter.allow("p1", "NONCE_SHARE"));
    }

    #[test]
    fn buckets_are_independent_per_peer_and_type() {
        let mut limiter = RateLimiter::new(RateLimiterConfig {
            burst: 1,
            refill_per_sec: 0.0,
        });
        assert!(limiter.allow("p1", "NONCE_SHARE"));
        assert!(!limiter.allow("p1", "NONCE_SHARE"));
        assert!(limiter.allow("p1", "PARTIAL_SIG_SHARE"));
        assert!(limiter.allow("p2", "NONCE_SHARE"));
    }
}
