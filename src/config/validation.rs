//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities positive, TTLs non-zero)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<_>>
//! - Missing secrets are NOT a validation error: the endpoint answers
//!   500 per request instead, so a half-rolled deployment stays up

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Config field path, e.g. "rate_limit.capacity".
    pub field: &'static str,
    /// Human-readable constraint description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.capacity <= 0.0 {
        errors.push(ValidationError {
            field: "rate_limit.capacity",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.refill_per_second <= 0.0 {
        errors.push(ValidationError {
            field: "rate_limit.refill_per_second",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.cost_per_request <= 0.0 {
        errors.push(ValidationError {
            field: "rate_limit.cost_per_request",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rate_limit.cost_per_request > config.rate_limit.capacity {
        errors.push(ValidationError {
            field: "rate_limit.cost_per_request",
            message: "must not exceed capacity".to_string(),
        });
    }
    if config.idempotency.ttl_secs == 0 {
        errors.push(ValidationError {
            field: "idempotency.ttl_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.idempotency.sweep_interval_secs == 0 {
        errors.push(ValidationError {
            field: "idempotency.sweep_interval_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: "must be greater than zero".to_string(),
        });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError {
            field: "security.max_body_size",
            message: "must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_violations() {
        let mut config = GatewayConfig::default();
        config.rate_limit.capacity = 0.0;
        config.idempotency.ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"rate_limit.capacity"));
        assert!(fields.contains(&"idempotency.ttl_secs"));
    }

    #[test]
    fn cost_must_not_exceed_capacity() {
        let mut config = GatewayConfig::default();
        config.rate_limit.capacity = 1.0;
        config.rate_limit.cost_per_request = 5.0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.field == "rate_limit.cost_per_request"));
    }
}
