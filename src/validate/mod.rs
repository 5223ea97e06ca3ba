//! Request validation subsystem.
//!
//! # Data Flow
//! ```text
//! parsed JSON body
//!     → envelope.rs (structural schema + cross-field rules)
//!     → allowlist.rs (per-table field filtering, required fields)
//!     → patch.rs (tagged per-table patch types)
//!     → Pass to the data store
//! ```
//!
//! # Design Decisions
//! - Structural errors name the offending field path but never echo the
//!   submitted value
//! - Allowlisting is write-side only; reads gate at table selection
//! - Downstream code handles typed patches, never raw maps

pub mod allowlist;
pub mod envelope;
pub mod patch;

pub use allowlist::{AllowlistRegistry, FilteredPatch};
pub use envelope::{validate_envelope, Action, RequestEnvelope, SchemaError, Table};
pub use patch::TablePatch;
