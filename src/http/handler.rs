//! The ingestion orchestrator.
//!
//! One handler sequences every gate in fixed order: feature flag,
//! configuration, content type, body parse, signature, rate limit,
//! envelope schema, idempotency, allowlist filtering, then the store
//! call, idempotency store, and audit event. Each gate is a hard stop:
//! a failure returns immediately and no later check or side effect
//! runs, beyond the error log.

use std::net::SocketAddr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::AuditEvent;
use crate::http::response::{
    apply_rate_limit_headers, success_body, GatewayError, HEADER_IDEMPOTENT_REPLAY,
};
use crate::http::server::AppState;
use crate::idempotency::cache::IDEMPOTENCY_HEADER;
use crate::idempotency::{valid_key, IdempotencyOutcome};
use crate::observability::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::signature::{self, KeyUsed, SIGNATURE_HEADER};
use crate::store::{Record, StoreError};
use crate::validate::envelope::{validate_envelope, Action, RequestEnvelope};
use crate::validate::patch::TablePatch;

/// Result of the per-action execution step.
struct ExecOutcome {
    /// Row(s) returned to the caller.
    data: Value,
    /// Field names stripped by the allowlist.
    rejected: Vec<String>,
    /// Target row id, for idempotency and audit.
    record_id: Option<String>,
    /// What was written (or the filters applied), for the audit event.
    payload: Value,
}

/// `POST /api/ingest`.
pub async fn ingest_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let (response, action) = process(&state, addr, &headers, &body).await;
    metrics::record_request(action, response.status().as_u16(), started);
    response
}

async fn process(
    state: &AppState,
    addr: SocketAddr,
    headers: &HeaderMap,
    body: &Bytes,
) -> (Response, &'static str) {
    // Gate: feature flag.
    if !state.config.api.enabled {
        tracing::warn!(status = 503, "Ingestion request while endpoint disabled");
        return (GatewayError::Disabled.into_response(), "unknown");
    }

    // Gate: backend configuration. Fatal for the request, not the
    // process.
    if state.config.api.active_secret.is_empty() {
        tracing::error!(status = 500, "Ingestion secret not configured");
        return (GatewayError::Unconfigured.into_response(), "unknown");
    }

    // Gate: content type.
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        tracing::warn!(status = 400, "Rejected non-JSON content type");
        return (GatewayError::BadContentType.into_response(), "unknown");
    }

    // Gate: body parse.
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(status = 400, "Rejected unparseable JSON body");
            return (GatewayError::BadJson.into_response(), "unknown");
        }
    };

    // Gate: signature presence, format, validity. Format and validity
    // failures share one response so callers cannot probe which check
    // tripped.
    let header_value = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            metrics::record_auth_failure("missing");
            tracing::warn!(status = 401, "Missing signature header");
            return (GatewayError::AuthenticationRequired.into_response(), "unknown");
        }
    };
    let signature_hex = match signature::parse_header(header_value) {
        Some(hex) => hex,
        None => {
            metrics::record_auth_failure("malformed");
            tracing::warn!(status = 401, "Malformed signature header");
            return (GatewayError::InvalidSignature.into_response(), "unknown");
        }
    };
    let verified = signature::verify(
        signature_hex,
        body,
        &state.config.api.active_secret,
        state.config.api.next_secret.as_deref(),
    );
    if !verified.valid {
        metrics::record_auth_failure("mismatch");
        tracing::warn!(status = 401, "Signature verification failed");
        return (GatewayError::InvalidSignature.into_response(), "unknown");
    }
    if let Some(key @ KeyUsed::Next) = verified.key_used {
        // Rotation progress is observable here: once this stops
        // appearing, the next secret can be promoted.
        tracing::info!(key = key.as_str(), "Request authenticated with next secret");
    }

    // Gate: rate limit. Admission and consumption are one atomic step.
    let rate_key = RateLimiter::key_from_signature(signature_hex);
    let decision = state.limiter.check(&rate_key);
    if !decision.allowed {
        tracing::warn!(
            client = %rate_key,
            retry_after = decision.retry_after,
            status = 429,
            "Rate limit exceeded"
        );
        return (GatewayError::RateLimited(decision).into_response(), "unknown");
    }

    // Gate: envelope schema.
    let envelope = match validate_envelope(&parsed) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(path = err.path, status = 400, "Envelope validation failed");
            return (GatewayError::Schema(err).into_response(), "unknown");
        }
    };
    let action = envelope.action.as_str();
    let table = envelope.table.as_str();
    let envelope_id = envelope.id.map(|id| id.to_string());

    // Gate: idempotency key format and lookup.
    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Some(key) = idempotency_key {
        if !valid_key(key) {
            tracing::warn!(action, table, status = 400, "Invalid idempotency key format");
            return (GatewayError::InvalidIdempotencyKey.into_response(), action);
        }
        match state
            .idempotency
            .check(key, table, envelope_id.as_deref(), body)
        {
            IdempotencyOutcome::Miss => {}
            IdempotencyOutcome::Conflict => {
                tracing::warn!(action, table, id = ?envelope_id, status = 409, "Idempotency key conflict");
                return (GatewayError::IdempotencyConflict.into_response(), action);
            }
            IdempotencyOutcome::Replay(cached) => {
                tracing::info!(action, table, id = ?envelope_id, "Serving idempotent replay");
                let mut response = (StatusCode::OK, Json(cached)).into_response();
                response.headers_mut().insert(
                    HEADER_IDEMPOTENT_REPLAY,
                    axum::http::HeaderValue::from_static("true"),
                );
                apply_rate_limit_headers(response.headers_mut(), &decision);
                return (response, action);
            }
        }
    }

    // Allowlist filtering and the data-store call.
    let outcome = match execute(state, &envelope).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(
                action,
                table,
                id = ?envelope_id,
                status = err.status().as_u16(),
                error = %err,
                "Request rejected"
            );
            return (err.into_response(), action);
        }
    };

    let audit_event_id = Uuid::new_v4();
    let timestamp = epoch_ms();
    let body_value = success_body(outcome.data, &outcome.rejected, audit_event_id, timestamp);

    // Idempotency store: writes only, best-effort by construction (an
    // in-memory insert cannot fail; a future remote cache must not
    // either).
    if matches!(envelope.action, Action::Create | Action::Update) {
        if let Some(key) = idempotency_key {
            state
                .idempotency
                .store(key, table, envelope_id.clone(), body, body_value.clone());
        }
    }

    // Audit event: best-effort, never fails the primary response.
    let event = AuditEvent {
        id: audit_event_id,
        actor: format!("api-key:{rate_key}"),
        action: action.to_string(),
        table: table.to_string(),
        record_id: outcome.record_id,
        payload: outcome.payload,
        ip: Some(addr.ip().to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        timestamp,
    };
    if let Err(err) = state.audit.record(event).await {
        metrics::record_audit_failure();
        tracing::warn!(action, table, error = %err, "Audit log write failed");
    }

    let mut response = (StatusCode::OK, Json(body_value)).into_response();
    apply_rate_limit_headers(response.headers_mut(), &decision);
    (response, action)
}

/// Run the per-action required-field / allowlist checks and the store
/// operation.
async fn execute(state: &AppState, envelope: &RequestEnvelope) -> Result<ExecOutcome, GatewayError> {
    let table = envelope.table.as_str();

    match envelope.action {
        Action::Create => {
            let patch = envelope.patch.clone().unwrap_or_default();

            let missing = state.allowlists.missing_required(table, &patch);
            if !missing.is_empty() {
                return Err(GatewayError::MissingRequiredFields(
                    missing.into_iter().map(String::from).collect(),
                ));
            }

            let filtered = state.allowlists.filter_patch(table, &patch);
            if filtered.allowed.is_empty() {
                return Err(GatewayError::NoValidFields {
                    verb: "insert",
                    rejected: filtered.rejected,
                });
            }

            let columns = typed_columns(state, envelope, filtered.allowed)?;
            let row = state
                .store
                .insert(table, columns.clone())
                .await
                .map_err(|err| store_error(state, err))?;
            let record_id = row
                .get("id")
                .and_then(Value::as_str)
                .map(String::from);

            Ok(ExecOutcome {
                data: Value::Object(row),
                rejected: filtered.rejected,
                record_id,
                payload: Value::Object(columns),
            })
        }

        Action::Update => {
            // Envelope validation guarantees the id.
            let id = envelope
                .id
                .ok_or(GatewayError::Schema(crate::validate::envelope::SchemaError {
                    path: "id",
                    message: "is required for update actions",
                }))?
                .to_string();
            let patch = envelope.patch.clone().unwrap_or_default();

            let filtered = state.allowlists.filter_patch(table, &patch);
            if filtered.allowed.is_empty() {
                return Err(GatewayError::NoValidFields {
                    verb: "update",
                    rejected: filtered.rejected,
                });
            }

            let columns = typed_columns(state, envelope, filtered.allowed)?;
            let row = state
                .store
                .update(table, &id, columns.clone())
                .await
                .map_err(|err| store_error(state, err))?;

            Ok(ExecOutcome {
                data: Value::Object(row),
                rejected: filtered.rejected,
                record_id: Some(id),
                payload: Value::Object(columns),
            })
        }

        Action::Read => {
            // Filters apply verbatim: read access gates at table
            // selection, not per field.
            let filters = envelope.filters.clone().unwrap_or_default();

            if let Some(id) = envelope.id {
                let id = id.to_string();
                let row = state
                    .store
                    .select_by_id(table, &id)
                    .await
                    .map_err(|err| store_error(state, err))?;
                Ok(ExecOutcome {
                    data: Value::Object(row),
                    rejected: Vec::new(),
                    record_id: Some(id.clone()),
                    payload: serde_json::json!({ "id": id }),
                })
            } else {
                let rows = state
                    .store
                    .select(table, &filters)
                    .await
                    .map_err(|err| store_error(state, err))?;
                Ok(ExecOutcome {
                    data: Value::Array(rows.into_iter().map(Value::Object).collect()),
                    rejected: Vec::new(),
                    record_id: None,
                    payload: Value::Object(filters),
                })
            }
        }
    }
}

/// Convert a filtered map into its typed per-table patch, then into the
/// column map for the store.
fn typed_columns(
    state: &AppState,
    envelope: &RequestEnvelope,
    allowed: serde_json::Map<String, Value>,
) -> Result<Record, GatewayError> {
    let patch = TablePatch::from_filtered(envelope.table, allowed).map_err(|err| {
        // Allowlist and patch schema drifted apart; surface as a
        // backend failure rather than blaming the caller.
        tracing::error!(table = %envelope.table, error = %err, "Filtered patch failed typing");
        GatewayError::Backend {
            detail: detail_for(state, err.to_string()),
        }
    })?;
    Ok(patch.into_columns())
}

fn store_error(state: &AppState, err: StoreError) -> GatewayError {
    match err {
        StoreError::NotFound => GatewayError::NotFound,
        other => {
            tracing::error!(error = %other, "Data store call failed");
            GatewayError::Backend {
                detail: detail_for(state, other.to_string()),
            }
        }
    }
}

/// Backend error detail is suppressed in production.
fn detail_for(state: &AppState, detail: String) -> Option<String> {
    if state.config.api.environment == "production" {
        None
    } else {
        Some(detail)
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
