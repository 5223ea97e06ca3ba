//! Wire shapes: error taxonomy, success envelope, response headers.
//!
//! Error bodies always carry a top-level `error` string, plus optional
//! `message` and `fields` detail. Backend detail is surfaced only
//! outside production.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::security::rate_limit::RateLimitDecision;
use crate::validate::envelope::SchemaError;

pub const HEADER_RATE_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATE_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RETRY_AFTER: &str = "retry-after";
pub const HEADER_IDEMPOTENT_REPLAY: &str = "x-idempotency-replay";

/// Seconds suggested to callers while the endpoint is disabled.
const DISABLED_RETRY_AFTER_SECS: u64 = 300;

/// Everything that can stop the pipeline. Each variant knows its status
/// code and wire shape; the handler logs context before returning one.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Feature flag off.
    #[error("ingestion endpoint disabled")]
    Disabled,

    /// Missing secrets. Fatal for the request, not the process.
    #[error("ingestion endpoint not configured")]
    Unconfigured,

    #[error("unsupported content type")]
    BadContentType,

    #[error("request body is not valid JSON")]
    BadJson,

    /// No signature header at all.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Malformed or mismatched signature; the two are deliberately
    /// indistinguishable on the wire.
    #[error("invalid signature")]
    InvalidSignature,

    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),

    #[error("invalid request envelope: {0}")]
    Schema(SchemaError),

    #[error("invalid idempotency key")]
    InvalidIdempotencyKey,

    /// Same idempotency key, different logical operation.
    #[error("idempotency key conflict")]
    IdempotencyConflict,

    #[error("missing required fields")]
    MissingRequiredFields(Vec<String>),

    /// Every patch field was rejected by the allowlist.
    #[error("no valid fields for {verb}")]
    NoValidFields {
        verb: &'static str,
        rejected: Vec<String>,
    },

    #[error("record not found")]
    NotFound,

    /// Data-store failure; detail surfaced only outside production.
    #[error("backend failure")]
    Backend { detail: Option<String> },
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BadContentType
            | GatewayError::BadJson
            | GatewayError::Schema(_)
            | GatewayError::InvalidIdempotencyKey
            | GatewayError::MissingRequiredFields(_)
            | GatewayError::NoValidFields { .. } => StatusCode::BAD_REQUEST,
            GatewayError::AuthenticationRequired | GatewayError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::IdempotencyConflict => StatusCode::CONFLICT,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            GatewayError::Disabled => json!({
                "error": "Service unavailable",
                "message": "Third-party ingestion is currently disabled",
            }),
            GatewayError::Unconfigured => json!({"error": "Server misconfigured"}),
            GatewayError::BadContentType => json!({
                "error": "Content-Type must be application/json",
            }),
            GatewayError::BadJson => json!({"error": "Invalid JSON body"}),
            GatewayError::AuthenticationRequired => json!({"error": "Authentication required"}),
            GatewayError::InvalidSignature => json!({"error": "Invalid signature"}),
            GatewayError::RateLimited(decision) => json!({
                "error": "Rate limit exceeded",
                "message": format!(
                    "Retry after {} seconds",
                    decision.retry_after.unwrap_or(1)
                ),
            }),
            GatewayError::Schema(err) => json!({
                "error": "Invalid request envelope",
                "message": err.to_string(),
            }),
            GatewayError::InvalidIdempotencyKey => json!({
                "error": "Invalid idempotency key",
                "message": "Keys are 1-255 characters of [A-Za-z0-9_-]",
            }),
            GatewayError::IdempotencyConflict => json!({
                "error": "Idempotency key conflict",
                "message": "This key was already used for a different operation",
            }),
            GatewayError::MissingRequiredFields(fields) => json!({
                "error": "Missing required fields",
                "fields": fields,
            }),
            GatewayError::NoValidFields { verb, rejected } => json!({
                "error": format!("No valid fields to {verb}"),
                "fields": rejected,
            }),
            GatewayError::NotFound => json!({"error": "Record not found"}),
            GatewayError::Backend { detail } => match detail {
                Some(detail) => json!({"error": "Backend failure", "message": detail}),
                None => json!({"error": "Backend failure"}),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();

        match &self {
            GatewayError::Disabled => {
                insert_number(
                    response.headers_mut(),
                    HEADER_RETRY_AFTER,
                    DISABLED_RETRY_AFTER_SECS,
                );
            }
            GatewayError::RateLimited(decision) => {
                insert_number(
                    response.headers_mut(),
                    HEADER_RETRY_AFTER,
                    decision.retry_after.unwrap_or(1),
                );
                apply_rate_limit_headers(response.headers_mut(), decision);
            }
            _ => {}
        }

        response
    }
}

/// The `{success, data, rejectedFields?, meta}` envelope for 200s.
/// Built as a `Value` so replayed responses serialize byte-identically
/// to the original.
pub fn success_body(
    data: Value,
    rejected_fields: &[String],
    audit_event_id: Uuid,
    timestamp_ms: u64,
) -> Value {
    let mut body = json!({
        "success": true,
        "data": data,
        "meta": {
            "auditEventId": audit_event_id.to_string(),
            "timestamp": timestamp_ms,
        },
    });
    if !rejected_fields.is_empty() {
        body["rejectedFields"] = json!(rejected_fields);
    }
    body
}

/// Attach `X-RateLimit-*` headers to a response.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    insert_number(headers, HEADER_RATE_LIMIT, decision.limit as u64);
    insert_number(headers, HEADER_RATE_REMAINING, decision.remaining as u64);
    insert_number(headers, HEADER_RATE_RESET, decision.reset_at);
}

fn insert_number(headers: &mut HeaderMap, name: &'static str, value: u64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}
