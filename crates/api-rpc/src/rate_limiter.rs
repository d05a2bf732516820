//! Rate Limiter (Token Bucket)
//!
//! Protects the mutating RPC method from request floods.

use std::sync::Mutex;
use std::time::Instant;

/// Token-bucket rate limiter
///
/// A mutexed float bucket is plenty at RPC-handler call rates; contention on
/// this lock is dwarfed by the request parsing around it.
pub struct RateLimiter {
    state: Mutex<BucketState>,
    max_tokens: f64,
    refill_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_tokens` - Maximum burst size
    /// * `refill_per_sec` - Tokens added per second
    pub fn new(max_tokens: u32, refill_per_sec: u32) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens as f64,
                last_refill: Instant::now(),
            }),
            max_tokens: max_tokens as f64,
            refill_per_sec: refill_per_sec as f64,
        }
    }

    /// Check if a request is allowed (consumes 1 token)
    pub fn check(&self) -> bool {
        let mut state = self.state.lock().unwrap();

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_allows_within_burst() {
        let limiter = RateLimiter::new(10, 10);

        for _ in 0..10 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());
    }

    #[test]
    fn test_refills_over_time() {
        let limiter = RateLimiter::new(5, 100);

        for _ in 0..5 {
            assert!(limiter.check());
        }
        assert!(!limiter.check());

        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.check());
    }

    #[test]
    fn test_burst_is_capped() {
        let limiter = RateLimiter::new(2, 1000);
        std::thread::sleep(Duration::from_millis(20));

        // Refill never exceeds the burst cap
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());
    }
}
