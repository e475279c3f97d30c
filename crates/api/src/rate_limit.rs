//! Per-client token-bucket rate limiter.
//!
//! Buckets live in a bounded `moka` cache: clients idle for longer than
//! `idle_ttl` are evicted, and at most `max_clients` buckets are kept. An
//! evicted client simply starts over with a full bucket.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use moka::sync::Cache;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Sustained refill rate, tokens per second.
    pub requests_per_second: u32,
    /// Bucket capacity.
    pub burst: u32,
    pub max_clients: u64,
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst: 20,
            max_clients: 10_000,
            idle_ttl: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("requests per second and burst must be positive")]
    NonPositive,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity);
        if now > self.last_refill {
            self.last_refill = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter; clone freely, clones share buckets.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Cache<String, Arc<Mutex<TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Result<Self, RateLimitError> {
        if config.requests_per_second == 0 || config.burst == 0 {
            return Err(RateLimitError::NonPositive);
        }

        let buckets = Cache::builder()
            .max_capacity(config.max_clients)
            .time_to_idle(config.idle_ttl)
            .build();

        Ok(Self {
            buckets,
            rate: f64::from(config.requests_per_second),
            capacity: f64::from(config.burst),
        })
    }

    /// Withdraw one token for `client`, returning whether the request may proceed.
    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    pub fn allow_at(&self, client: &str, now: Instant) -> bool {
        let capacity = self.capacity;
        // `get_with` initialises at most once per key, even under contention.
        let bucket = self
            .buckets
            .get_with(client.to_string(), || Arc::new(Mutex::new(TokenBucket::full(capacity, now))));

        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(self.capacity, self.rate, now)
    }

    /// Number of clients currently tracked (after pending evictions run).
    pub fn tracked_clients(&self) -> u64 {
        self.buckets.run_pending_tasks();
        self.buckets.entry_count()
    }
}

impl core::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rate", &self.rate)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn limiter(rps: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            requests_per_second: rps,
            burst,
            max_clients: 1_000,
            idle_ttl: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn burst_then_reject_then_refill() {
        let rl = limiter(2, 3);
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(rl.allow_at("1.2.3.4", t0));
        }
        assert!(!rl.allow_at("1.2.3.4", t0));

        // Two tokens per second: half a second buys exactly one more.
        let t1 = t0 + Duration::from_millis(500);
        assert!(rl.allow_at("1.2.3.4", t1));
        assert!(!rl.allow_at("1.2.3.4", t1));
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let rl = limiter(100, 2);
        let t0 = Instant::now();
        assert!(rl.allow_at("c", t0));

        let later = t0 + Duration::from_secs(60);
        assert!(rl.allow_at("c", later));
        assert!(rl.allow_at("c", later));
        assert!(!rl.allow_at("c", later));
    }

    #[test]
    fn clients_are_independent() {
        let rl = limiter(1, 1);
        let t0 = Instant::now();
        assert!(rl.allow_at("a", t0));
        assert!(!rl.allow_at("a", t0));
        assert!(rl.allow_at("b", t0));
    }

    #[test]
    fn concurrent_callers_never_exceed_burst() {
        let rl = limiter(1, 25);
        let t0 = Instant::now();
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rl = rl.clone();
                let granted = granted.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        if rl.allow_at("shared", t0) {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 25);
        assert_eq!(rl.tracked_clients(), 1);
    }

    #[test]
    fn idle_clients_are_evicted_and_start_fresh() {
        let rl = RateLimiter::new(&RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            max_clients: 100,
            idle_ttl: Duration::from_millis(50),
        })
        .unwrap();

        assert!(rl.allow("10.0.0.9"));
        assert!(rl.allow("10.0.0.9"));
        assert!(!rl.allow("10.0.0.9"));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(rl.tracked_clients(), 0);

        // 150ms at 1 rps would refill well under one token; a full bucket
        // means the old entry is gone.
        assert!(rl.allow("10.0.0.9"));
        assert!(rl.allow("10.0.0.9"));
    }

    #[test]
    fn zero_configuration_is_rejected() {
        let cfg = RateLimitConfig {
            requests_per_second: 0,
            ..RateLimitConfig::default()
        };
        assert_eq!(RateLimiter::new(&cfg).unwrap_err(), RateLimitError::NonPositive);
    }
}
