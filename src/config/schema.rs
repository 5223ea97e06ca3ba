//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from config
//! files; secret material is filled in from the environment by the loader.

use serde::{Deserialize, Serialize};

/// Root configuration for the ingestion gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// API feature flag, secrets, and environment name.
    pub api: ApiConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Idempotency cache configuration.
    pub idempotency: IdempotencyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening limits.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// API enablement and authentication secrets.
///
/// The secrets are deliberately absent from the TOML schema defaults;
/// the loader populates them from `INGEST_API_SECRET` and
/// `INGEST_API_SECRET_NEXT`. Running with an empty active secret is a
/// per-request misconfiguration error, not a startup failure, so a
/// half-configured deployment serves 500s instead of crash-looping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Master switch for the ingestion endpoint. Disabled returns 503.
    pub enabled: bool,

    /// Active HMAC secret. Tried first on every request.
    pub active_secret: String,

    /// Optional next HMAC secret for zero-downtime rotation. Deployed
    /// alongside the active secret during a migration window, then
    /// promoted.
    pub next_secret: Option<String>,

    /// Deployment environment name ("production" suppresses backend
    /// error detail in responses).
    pub environment: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            active_secret: String::new(),
            next_secret: None,
            environment: "development".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Bucket capacity (maximum burst size).
    pub capacity: f64,

    /// Tokens replenished per second.
    pub refill_per_second: f64,

    /// Tokens consumed per admitted request.
    pub cost_per_request: f64,

    /// Idle period after which a bucket is reclaimed, in seconds.
    pub idle_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // 60 requests/minute steady state with a burst of 60.
        Self {
            capacity: 60.0,
            refill_per_second: 1.0,
            cost_per_request: 1.0,
            idle_secs: 600,
        }
    }
}

/// Idempotency cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Record time-to-live in seconds.
    pub ttl_secs: u64,

    /// Background sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 256 * 1024,
        }
    }
}
