//! Token-bucket rate limiting

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

/// Outcome of one rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Whole tokens left after this request
    pub remaining: u32,
}

/// Storage of the per-client buckets.
///
/// A check is a single read-modify-write of one bucket and must be atomic
/// per key. Implementations other than the in-process one can share buckets
/// across processes.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision;
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    /// Parameters of the last check, used when sweeping
    limit: u32,
    window: Duration,
}

impl Bucket {
    fn full(limit: u32, window: Duration, now: Instant) -> Self {
        Self {
            tokens: f64::from(limit),
            last_refill: now,
            limit,
            window,
        }
    }

    fn refilled(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        let rate = f64::from(self.limit) / self.window.as_secs_f64().max(f64::EPSILON);
        (self.tokens + elapsed * rate).min(f64::from(self.limit))
    }

    /// Refills continuously at `limit` tokens per `window`, capped at `limit`
    fn refill(&mut self, limit: u32, window: Duration, now: Instant) {
        self.limit = limit;
        self.window = window;
        self.tokens = self.refilled(now);
        self.last_refill = now;
    }

    /// A full bucket is indistinguishable from a new one
    fn is_full(&self, now: Instant) -> bool {
        self.refilled(now) >= f64::from(self.limit)
    }

    fn try_take(&mut self) -> RateLimitDecision {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateLimitDecision {
                allowed: true,
                remaining: self.tokens.floor() as u32,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
            }
        }
    }
}

/// Buckets held in this process. Construct once and share.
///
/// Buckets that have refilled completely are dropped, at most once per window.
#[derive(Debug)]
pub struct InMemoryRateLimitStore {
    buckets: DashMap<String, Bucket>,
    last_sweep: Mutex<Instant>,
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self {
            buckets: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep_if_due(&self, window: Duration, now: Instant) {
        {
            let Ok(mut last_sweep) = self.last_sweep.lock() else {
                return;
            };
            if now.duration_since(*last_sweep) < window {
                return;
            }
            *last_sweep = now;
        }

        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_full(now));
        debug!("Dropped {} full rate-limit buckets", before - self.buckets.len());
    }

    /// Number of tracked client keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn check(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        let now = Instant::now();
        let decision = {
            // The entry guard holds the shard lock for the whole read-modify-write
            let mut bucket = self
                .buckets
                .entry(key.to_string())
                .or_insert_with(|| Bucket::full(limit, window, now));
            bucket.refill(limit, window, now);
            bucket.try_take()
        };
        if !decision.allowed {
            debug!("Rate limit exhausted for {}", key);
        }

        self.sweep_if_due(window, now);
        decision
    }
}
