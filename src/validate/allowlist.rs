//! Per-table field allowlists and validators.
//!
//! Each writable table carries a static schema: the fields a caller may
//! supply, the fields a create must supply, the fields only the server
//! may set, and per-field validator predicates. The registry is built
//! once at startup and never mutated.
//!
//! Requester contact fields (email, phone) are deliberately absent from
//! the allowed sets: third parties can never write them. Read responses
//! are not filtered per field; read access gates at table selection
//! only.

use std::collections::HashMap;

use serde_json::{Map, Value};
use uuid::Uuid;

/// Jamaican parishes accepted by location fields.
pub const PARISHES: [&str; 14] = [
    "Kingston",
    "St. Andrew",
    "St. Thomas",
    "Portland",
    "St. Mary",
    "St. Ann",
    "Trelawny",
    "St. James",
    "Hanover",
    "Westmoreland",
    "St. Elizabeth",
    "Manchester",
    "Clarendon",
    "St. Catherine",
];

/// Lifecycle states of a missing-person request.
pub const REQUEST_STATUSES: [&str; 4] = ["missing", "sighted", "found", "closed"];

/// Pure predicate over the raw submitted value.
type Validator = fn(&Value) -> bool;

/// Static write schema for one table.
pub struct TableAllowlist {
    allowed: &'static [&'static str],
    required: &'static [&'static str],
    read_only: &'static [&'static str],
    validators: HashMap<&'static str, Validator>,
}

/// Result of filtering a patch against a table's allowlist.
#[derive(Debug, Clone, Default)]
pub struct FilteredPatch {
    /// Fields that survived filtering, ready for the typed patch.
    pub allowed: Map<String, Value>,
    /// Field names rejected (unknown, read-only, or failed validation).
    pub rejected: Vec<String>,
}

/// Immutable registry of table allowlists, keyed by table name.
pub struct AllowlistRegistry {
    tables: HashMap<&'static str, TableAllowlist>,
}

impl AllowlistRegistry {
    /// The production schema for the two ingestion tables.
    pub fn builtin() -> Self {
        let mut tables = HashMap::new();

        let mut requests_validators: HashMap<&'static str, Validator> = HashMap::new();
        requests_validators.insert("target_first_name", is_name);
        requests_validators.insert("target_last_name", is_name);
        requests_validators.insert("target_age", is_age);
        requests_validators.insert("target_description", is_long_text);
        requests_validators.insert("last_known_location", is_place);
        requests_validators.insert("parish", is_parish);
        requests_validators.insert("status", is_status);
        // additional_info intentionally has no validator.

        tables.insert(
            "requests",
            TableAllowlist {
                allowed: &[
                    "target_first_name",
                    "target_last_name",
                    "target_age",
                    "target_description",
                    "last_known_location",
                    "parish",
                    "status",
                    "additional_info",
                ],
                required: &["target_first_name", "target_last_name", "parish"],
                read_only: &["id", "created_at", "updated_at"],
                validators: requests_validators,
            },
        );

        let mut updates_validators: HashMap<&'static str, Validator> = HashMap::new();
        updates_validators.insert("request_id", is_uuid);
        updates_validators.insert("message_from_found_party", is_message);
        updates_validators.insert("parish", is_parish);
        // found_location intentionally has no validator.

        tables.insert(
            "found_updates",
            TableAllowlist {
                allowed: &[
                    "request_id",
                    "message_from_found_party",
                    "found_location",
                    "parish",
                ],
                required: &["request_id", "message_from_found_party"],
                read_only: &["id", "created_at"],
                validators: updates_validators,
            },
        );

        Self { tables }
    }

    /// A registry with no tables; every field of every patch is
    /// rejected. Used in tests for the unknown-table path.
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Partition a patch into allowed fields and rejected field names.
    ///
    /// A field is rejected when it is unknown to the table, server-set
    /// (read-only), or fails its registered validator. Fields with no
    /// validator accept any value of any type; the store is the last
    /// line of defense for those.
    pub fn filter_patch(&self, table: &str, patch: &Map<String, Value>) -> FilteredPatch {
        let schema = match self.tables.get(table) {
            Some(s) => s,
            None => {
                // Unknown table: total rejection.
                return FilteredPatch {
                    allowed: Map::new(),
                    rejected: patch.keys().cloned().collect(),
                };
            }
        };

        let mut filtered = FilteredPatch::default();
        for (field, value) in patch {
            let permitted = schema.allowed.contains(&field.as_str())
                && !schema.read_only.contains(&field.as_str())
                && schema
                    .validators
                    .get(field.as_str())
                    .map_or(true, |validate| validate(value));
            if permitted {
                filtered.allowed.insert(field.clone(), value.clone());
            } else {
                filtered.rejected.push(field.clone());
            }
        }
        filtered
    }

    /// Required fields missing from a patch. A field counts as missing
    /// when absent or explicitly `null`, even if otherwise allowed.
    pub fn missing_required(&self, table: &str, patch: &Map<String, Value>) -> Vec<&'static str> {
        let schema = match self.tables.get(table) {
            Some(s) => s,
            None => return Vec::new(),
        };

        schema
            .required
            .iter()
            .filter(|field| matches!(patch.get(**field), None | Some(Value::Null)))
            .copied()
            .collect()
    }
}

fn is_name(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| !s.is_empty() && s.len() <= 100)
}

fn is_place(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.len() <= 500)
}

fn is_long_text(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.len() <= 2000)
}

fn is_message(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| !s.is_empty() && s.len() <= 2000)
}

fn is_age(value: &Value) -> bool {
    value.as_u64().is_some_and(|n| n <= 120)
}

fn is_parish(value: &Value) -> bool {
    value.as_str().is_some_and(|s| PARISHES.contains(&s))
}

fn is_status(value: &Value) -> bool {
    value.as_str().is_some_and(|s| REQUEST_STATUSES.contains(&s))
}

fn is_uuid(value: &Value) -> bool {
    value.as_str().is_some_and(|s| Uuid::parse_str(s).is_ok())
}
