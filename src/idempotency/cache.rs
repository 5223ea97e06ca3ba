//! In-process idempotency record cache.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::schema::IdempotencyConfig;
use crate::observability::metrics;

/// Header carrying the client-supplied idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

const MAX_KEY_LEN: usize = 255;

/// Key format gate: non-empty, ≤255 chars, `[A-Za-z0-9_-]` only.
/// Anything else is rejected before the cache is consulted.
pub fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A cached write, keyed by the client-supplied idempotency key.
#[derive(Debug, Clone)]
struct IdempotencyRecord {
    table: String,
    target_id: Option<String>,
    payload_hash: String,
    response: Value,
    expires_at: u64,
}

/// Outcome of an idempotency lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyOutcome {
    /// No prior record; the caller proceeds normally.
    Miss,
    /// Exact replay of a completed write; serve the cached response and
    /// mark it as a replay.
    Replay(Value),
    /// The key was reused for a different logical operation; the caller
    /// must reject rather than execute or return stale data.
    Conflict,
}

/// Process-wide idempotency cache shared across request handlers.
///
/// Record lifecycle is independent of any single request: created on
/// first successful write, read on retry, expired after the TTL or by
/// the background sweep.
pub struct IdempotencyCache {
    records: DashMap<String, IdempotencyRecord>,
    config: IdempotencyConfig,
}

impl IdempotencyCache {
    pub fn new(config: IdempotencyConfig) -> Self {
        Self {
            records: DashMap::new(),
            config,
        }
    }

    /// Look up a key for the (table, target id, payload) of the current
    /// request. A record is only reused when all three match; any
    /// difference is a conflicting reuse of the key.
    pub fn check(
        &self,
        key: &str,
        table: &str,
        target_id: Option<&str>,
        raw_payload: &[u8],
    ) -> IdempotencyOutcome {
        let record = match self.records.get(key) {
            Some(r) => r,
            None => return IdempotencyOutcome::Miss,
        };

        if record.expires_at <= epoch_secs() {
            drop(record);
            self.records.remove(key);
            return IdempotencyOutcome::Miss;
        }

        let same_target = record.table == table && record.target_id.as_deref() == target_id;
        if same_target && record.payload_hash == payload_hash(raw_payload) {
            metrics::record_idempotency_replay();
            IdempotencyOutcome::Replay(record.response.clone())
        } else {
            metrics::record_idempotency_conflict();
            IdempotencyOutcome::Conflict
        }
    }

    /// Cache the response of a completed write. Best-effort: callers
    /// never fail the primary operation over this.
    pub fn store(
        &self,
        key: &str,
        table: &str,
        target_id: Option<String>,
        raw_payload: &[u8],
        response: Value,
    ) {
        let now = epoch_secs();
        self.records.insert(
            key.to_string(),
            IdempotencyRecord {
                table: table.to_string(),
                target_id,
                payload_hash: payload_hash(raw_payload),
                response,
                expires_at: now + self.config.ttl_secs,
            },
        );
    }

    /// Delete expired records. Returns the number removed. Racing a
    /// same-key check is benign: a removed record reads as a miss, and a
    /// fresh write recreates it.
    pub fn sweep(&self) -> usize {
        let now = epoch_secs();
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// SHA-256 of the raw body bytes, hex-encoded. Deliberately not a
/// canonical-JSON hash: whitespace or key order changes count as a
/// different payload.
fn payload_hash(raw_payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_payload);
    hex::encode(hasher.finalize())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
