//! Idempotency subsystem.
//!
//! # Data Flow
//! ```text
//! Idempotency-Key header
//!     → key format check (reject before any lookup)
//!     → cache.rs check (miss / replay / conflict)
//!     → [pipeline executes the write on a miss]
//!     → cache.rs store (best-effort, after success)
//! ```
//!
//! # Design Decisions
//! - Payload equality is a hash of the raw body bytes, not canonical
//!   JSON: reordered-but-equivalent bodies count as different payloads
//! - Records expire after a fixed TTL; expired records read as absent
//! - A replay returns the cached response verbatim, flagged as a replay

pub mod cache;

pub use cache::{valid_key, IdempotencyCache, IdempotencyOutcome};
