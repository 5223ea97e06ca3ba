//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → signature.rs (verify HMAC over the raw body, dual-key)
//!     → rate_limit.rs (per-key token bucket admission)
//!     → Pass to envelope validation
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Verification failures are indistinguishable from the outside
//! - Rate-limit keys derive from a signature prefix, never the client IP

pub mod rate_limit;
pub mod signature;
