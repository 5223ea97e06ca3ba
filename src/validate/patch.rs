//! Tagged per-table patch types.
//!
//! A patch only becomes typed after allowlist filtering, so these types
//! can assume every validated field carries a well-formed value. Code
//! past this point never handles untyped maps; `into_columns` converts
//! back at the store boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::validate::envelope::Table;

/// Status of a missing-person request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Missing,
    Sighted,
    Found,
    Closed,
}

/// Jamaican parish, serialized under its proper name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parish {
    #[serde(rename = "Kingston")]
    Kingston,
    #[serde(rename = "St. Andrew")]
    StAndrew,
    #[serde(rename = "St. Thomas")]
    StThomas,
    #[serde(rename = "Portland")]
    Portland,
    #[serde(rename = "St. Mary")]
    StMary,
    #[serde(rename = "St. Ann")]
    StAnn,
    #[serde(rename = "Trelawny")]
    Trelawny,
    #[serde(rename = "St. James")]
    StJames,
    #[serde(rename = "Hanover")]
    Hanover,
    #[serde(rename = "Westmoreland")]
    Westmoreland,
    #[serde(rename = "St. Elizabeth")]
    StElizabeth,
    #[serde(rename = "Manchester")]
    Manchester,
    #[serde(rename = "Clarendon")]
    Clarendon,
    #[serde(rename = "St. Catherine")]
    StCatherine,
}

/// Writable fields of the `requests` table.
///
/// `additional_info` has no validator and so stays an open value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parish: Option<Parish>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Value>,
}

/// Writable fields of the `found_updates` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundUpdatesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_from_found_party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parish: Option<Parish>,
}

/// A filtered patch, tagged by its table.
#[derive(Debug, Clone)]
pub enum TablePatch {
    Requests(RequestsPatch),
    FoundUpdates(FoundUpdatesPatch),
}

/// A filtered map did not fit its table's patch type. Only reachable if
/// the allowlist and the patch schema drift apart.
#[derive(Debug, Error)]
#[error("filtered patch does not fit table `{table}`")]
pub struct PatchError {
    pub table: &'static str,
    #[source]
    source: serde_json::Error,
}

impl TablePatch {
    /// Build the typed patch from an allowlist-filtered map.
    pub fn from_filtered(table: Table, allowed: Map<String, Value>) -> Result<Self, PatchError> {
        let value = Value::Object(allowed);
        match table {
            Table::Requests => serde_json::from_value(value)
                .map(TablePatch::Requests)
                .map_err(|source| PatchError {
                    table: table.as_str(),
                    source,
                }),
            Table::FoundUpdates => serde_json::from_value(value)
                .map(TablePatch::FoundUpdates)
                .map_err(|source| PatchError {
                    table: table.as_str(),
                    source,
                }),
        }
    }

    pub fn table(&self) -> Table {
        match self {
            TablePatch::Requests(_) => Table::Requests,
            TablePatch::FoundUpdates(_) => Table::FoundUpdates,
        }
    }

    /// Column map for the store boundary. Unset fields are omitted
    /// entirely rather than written as nulls.
    pub fn into_columns(self) -> Map<String, Value> {
        let serialized = match self {
            TablePatch::Requests(patch) => serde_json::to_value(patch),
            TablePatch::FoundUpdates(patch) => serde_json::to_value(patch),
        };
        match serialized {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
