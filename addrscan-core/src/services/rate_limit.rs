//! Client-side token bucket
//!
//! Every physical request (retries included) takes one token. The bucket is
//! shared across workers so concurrency never raises the request rate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ports::Clock;

/// Slowest rate honored; anything positive below it is raised to it
pub const MIN_REQUESTS_PER_SECOND: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Refill rate; zero or less disables limiting
    pub requests_per_second: f64,
    pub burst: u32,
}

impl RateLimit {
    /// Raise a positive rate below `MIN_REQUESTS_PER_SECOND` to it; a rate
    /// that is not a finite number disables limiting.
    pub fn clamped(self) -> Self {
        let rps = self.requests_per_second;
        let requests_per_second = if !rps.is_finite() || rps <= 0.0 {
            0.0
        } else {
            rps.max(MIN_REQUESTS_PER_SECOND)
        };
        Self {
            requests_per_second,
            ..self
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst: 5,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill_ms: i64,
}

pub struct RateLimiter {
    limit: RateLimit,
    clock: Arc<dyn Clock>,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        let limit = limit.clamped();
        let now = clock.now_ms();
        Self {
            bucket: Mutex::new(Bucket {
                tokens: limit.burst.max(1) as f64,
                last_refill_ms: now,
            }),
            limit,
            clock,
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    fn is_unlimited(&self) -> bool {
        self.limit.requests_per_second <= 0.0
    }

    /// Take a token without waiting
    ///
    /// Returns how long until one would be available otherwise.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        if self.is_unlimited() {
            return Ok(());
        }

        let now = self.clock.now_ms();
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());

        let elapsed_ms = (now - bucket.last_refill_ms).max(0) as f64;
        let capacity = self.limit.burst.max(1) as f64;
        bucket.tokens =
            (bucket.tokens + elapsed_ms * self.limit.requests_per_second / 1000.0).min(capacity);
        bucket.last_refill_ms = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            let wait_ms = (missing * 1000.0 / self.limit.requests_per_second).ceil() as u64;
            Err(Duration::from_millis(wait_ms.max(1)))
        }
    }

    /// Block (through the clock) until a token is available
    pub fn acquire(&self) {
        while let Err(wait) = self.try_acquire() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting");
            self.clock.sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;

    fn limiter(rps: f64, burst: u32) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = RateLimiter::new(
            RateLimit {
                requests_per_second: rps,
                burst,
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_burst_available_immediately() {
        let (limiter, clock) = limiter(2.0, 3);
        for _ in 0..3 {
            limiter.acquire();
        }
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_waits_once_burst_spent() {
        let (limiter, clock) = limiter(2.0, 1);
        limiter.acquire();
        limiter.acquire();
        assert_eq!(clock.total_slept(), Duration::from_millis(500));
    }

    #[test]
    fn test_steady_rate() {
        let (limiter, clock) = limiter(5.0, 1);
        for _ in 0..11 {
            limiter.acquire();
        }
        // 10 requests after the first at 200ms each
        assert_eq!(clock.now_ms(), 2_000);
    }

    #[test]
    fn test_refill_capped_at_burst() {
        let (limiter, clock) = limiter(10.0, 2);
        limiter.acquire();
        limiter.acquire();
        clock.advance(Duration::from_secs(60));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_tiny_rate_waits_a_bounded_time() {
        let (limiter, clock) = limiter(1e-300, 1);
        limiter.acquire();
        limiter.acquire();
        assert_eq!(limiter.limit().requests_per_second, MIN_REQUESTS_PER_SECOND);
        let slept = clock.total_slept();
        assert!(slept >= Duration::from_secs(100) && slept < Duration::from_secs(101));
    }

    #[test]
    fn test_non_finite_rate_is_unlimited() {
        for rps in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let (limiter, clock) = limiter(rps, 1);
            for _ in 0..10 {
                limiter.acquire();
            }
            assert!(clock.sleeps().is_empty());
        }
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        let (limiter, clock) = limiter(0.0, 1);
        for _ in 0..100 {
            limiter.acquire();
        }
        assert!(clock.sleeps().is_empty());
    }
}
