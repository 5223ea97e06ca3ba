//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! POST /api/ingest
//!     → server.rs (router, middleware, shared state)
//!     → handler.rs (the gate pipeline / orchestrator)
//!     → response.rs (wire shapes, status codes, headers)
//! ```

pub mod handler;
pub mod response;
pub mod server;

pub use response::GatewayError;
pub use server::{AppState, GatewayServer};
