//! Per-key token-bucket rate limiting.
//!
//! Buckets refill continuously: each check adds `elapsed * refill_rate`
//! tokens (capped at capacity) before attempting to deduct the request
//! cost. Admission and consumption are a single atomic step under the
//! map entry, so concurrent requests on the same key never double-spend.
//!
//! Rate-limit state is soft: an idle bucket reclaimed by the sweeper is
//! indistinguishable from a fresh one on next use.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use crate::config::schema::RateLimitConfig;
use crate::observability::metrics;

/// Length of the signature prefix used as the bucket key.
const KEY_PREFIX_LEN: usize = 16;

/// A single token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Bucket capacity, surfaced as `X-RateLimit-Limit`.
    pub limit: u32,
    /// Whole tokens left after this check.
    pub remaining: u32,
    /// Epoch seconds at which the bucket is full again.
    pub reset_at: u64,
    /// Seconds to wait before retrying; present only on rejection.
    pub retry_after: Option<u64>,
}

/// Shared rate limiter over per-key token buckets.
///
/// Buckets are lazily created on first use and reclaimed by
/// [`RateLimiter::sweep`] after sitting idle. Different keys only ever
/// contend at DashMap shard granularity.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Derive the bucket key from a request signature.
    ///
    /// A fixed prefix bounds key cardinality while staying unguessable
    /// without the secret.
    pub fn key_from_signature(signature_hex: &str) -> String {
        signature_hex
            .chars()
            .take(KEY_PREFIX_LEN)
            .collect::<String>()
            .to_ascii_lowercase()
    }

    /// Check and consume in one step. The entry guard holds the shard
    /// lock for the duration of the read-modify-write, so refill and
    /// deduction never interleave for the same key.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let capacity = self.config.capacity;
        let refill = self.config.refill_per_second;
        let cost = self.config.cost_per_request;

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(capacity));

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            RateLimitDecision {
                allowed: true,
                limit: capacity as u32,
                remaining: bucket.tokens.floor() as u32,
                reset_at: epoch_in(seconds_until(capacity - bucket.tokens, refill)),
                retry_after: None,
            }
        } else {
            let wait = seconds_until(cost - bucket.tokens, refill).max(1);
            metrics::record_rate_limited();
            RateLimitDecision {
                allowed: false,
                limit: capacity as u32,
                remaining: bucket.tokens.floor() as u32,
                reset_at: epoch_in(seconds_until(capacity - bucket.tokens, refill)),
                retry_after: Some(wait),
            }
        }
    }

    /// Reclaim buckets idle longer than the configured period. Returns
    /// the number of buckets removed. Racing a concurrent check on the
    /// same key is benign: the key is recreated full on next use.
    pub fn sweep(&self) -> usize {
        let idle = Duration::from_secs(self.config.idle_secs);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_refill.elapsed() < idle);
        before - self.buckets.len()
    }

    /// Number of live buckets, for the cache-size gauge.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Whole seconds until `deficit` tokens accrue at `refill` per second.
fn seconds_until(deficit: f64, refill: f64) -> u64 {
    (deficit / refill).ceil() as u64
}

fn epoch_in(secs: u64) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        + secs
}
