//! Append-only audit event sink.
//!
//! Every successful operation, reads included, produces one write-once
//! [`AuditEvent`]. The sink is best-effort from the pipeline's point of
//! view: a failed audit write is logged and swallowed, never surfaced
//! to the client.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// A single audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event id, echoed to the client in `meta.auditEventId`.
    pub id: Uuid,
    /// Who performed the operation (here: an api-key fingerprint).
    pub actor: String,
    /// create / update / read.
    pub action: String,
    pub table: String,
    /// Target row id, when known.
    pub record_id: Option<String>,
    /// The columns written, or the filters applied for reads.
    pub payload: Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Sink(String),
}

/// Append-only event log collaborator.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// Default sink: emits the event as a structured log line under the
/// `audit` target, for the platform's log shipper to pick up.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            event_id = %event.id,
            actor = %event.actor,
            action = %event.action,
            table = %event.table,
            record_id = ?event.record_id,
            ip = ?event.ip,
            "audit event"
        );
        Ok(())
    }
}

/// Test sink that collects events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit sink mutex poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .expect("audit sink mutex poisoned")
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_sink_collects_events() {
        let sink = MemoryAuditSink::new();
        sink.record(AuditEvent {
            id: Uuid::new_v4(),
            actor: "api-key:abcd".to_string(),
            action: "create".to_string(),
            table: "requests".to_string(),
            record_id: Some("row-1".to_string()),
            payload: json!({"status": "missing"}),
            ip: Some("203.0.113.9".to_string()),
            user_agent: None,
            timestamp: 0,
        })
        .await
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "create");
    }
}
