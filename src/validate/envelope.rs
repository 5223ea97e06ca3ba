//! Structural validation of the request envelope.
//!
//! The envelope is the fixed outer shape of every ingestion call:
//! `{table, action, id?, patch?, filters?}`. Validation here is purely
//! structural; field-level rules live in the allowlist engine.

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Tables writable through the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Requests,
    FoundUpdates,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Requests => "requests",
            Table::FoundUpdates => "found_updates",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requests" => Some(Table::Requests),
            "found_updates" => Some(Table::FoundUpdates),
            _ => None,
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations supported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Read,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "read" => Some(Action::Read),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated request envelope. Owned by the orchestrator for
/// the duration of one call.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub table: Table,
    pub action: Action,
    pub id: Option<Uuid>,
    pub patch: Option<Map<String, Value>>,
    pub filters: Option<Map<String, Value>>,
}

/// Structural validation failure. The path aids API consumers; the
/// message is a fixed constraint description so submitted values are
/// never reflected back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: &'static str,
    pub message: &'static str,
}

impl SchemaError {
    fn new(path: &'static str, message: &'static str) -> Self {
        Self { path, message }
    }
}

/// Validate the parsed request body into an envelope.
///
/// Cross-field rules: `update` requires `id`; `create` and `update`
/// require `patch`; `read` requires neither. `null` counts as absent.
pub fn validate_envelope(body: &Value) -> Result<RequestEnvelope, SchemaError> {
    let object = body
        .as_object()
        .ok_or_else(|| SchemaError::new("$", "must be a JSON object"))?;

    let table = match object.get("table") {
        Some(Value::String(s)) => Table::parse(s).ok_or_else(|| {
            SchemaError::new("table", "must be one of `requests`, `found_updates`")
        })?,
        Some(_) => {
            return Err(SchemaError::new(
                "table",
                "must be one of `requests`, `found_updates`",
            ))
        }
        None => return Err(SchemaError::new("table", "is required")),
    };

    let action = match object.get("action") {
        Some(Value::String(s)) => Action::parse(s).ok_or_else(|| {
            SchemaError::new("action", "must be one of `create`, `update`, `read`")
        })?,
        Some(_) => {
            return Err(SchemaError::new(
                "action",
                "must be one of `create`, `update`, `read`",
            ))
        }
        None => return Err(SchemaError::new("action", "is required")),
    };

    let id = match object.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(
            Uuid::parse_str(s).map_err(|_| SchemaError::new("id", "must be a valid UUID"))?,
        ),
        Some(_) => return Err(SchemaError::new("id", "must be a valid UUID")),
    };

    let patch = optional_object(object, "patch", "must be a JSON object")?;
    let filters = optional_object(object, "filters", "must be a JSON object")?;

    if action == Action::Update && id.is_none() {
        return Err(SchemaError::new("id", "is required for update actions"));
    }
    if matches!(action, Action::Create | Action::Update) && patch.is_none() {
        return Err(SchemaError::new(
            "patch",
            "is required for create and update actions",
        ));
    }

    Ok(RequestEnvelope {
        table,
        action,
        id,
        patch,
        filters,
    })
}

fn optional_object(
    object: &Map<String, Value>,
    path: &'static str,
    message: &'static str,
) -> Result<Option<Map<String, Value>>, SchemaError> {
    match object.get(path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(SchemaError::new(path, message)),
    }
}
