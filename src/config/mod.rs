//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: flag, secrets)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Secrets and the enable flag come from the environment, never from
//!   the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ApiConfig;
pub use schema::GatewayConfig;
pub use schema::IdempotencyConfig;
pub use schema::RateLimitConfig;
