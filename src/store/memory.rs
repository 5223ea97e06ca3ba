//! In-memory data store.
//!
//! Used by the default binary wiring and the test harness. Rows live in
//! a per-table concurrent map; ids and timestamps are server-assigned
//! the way the hosted store would.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::store::{DataStore, Record, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    tables: DashMap<String, DashMap<String, Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row count for a table. Test helper.
    pub fn count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |rows| rows.len())
    }

    fn matches(row: &Record, filters: &Record) -> bool {
        filters
            .iter()
            .all(|(column, expected)| row.get(column) == Some(expected))
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn insert(&self, table: &str, columns: Record) -> Result<Record, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = epoch_ms();

        let mut row = columns;
        row.insert("id".to_string(), json!(id));
        row.insert("created_at".to_string(), json!(now));
        row.insert("updated_at".to_string(), json!(now));

        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, columns: Record) -> Result<Record, StoreError> {
        let rows = self.tables.get(table).ok_or(StoreError::NotFound)?;
        let mut row = rows.get_mut(id).ok_or(StoreError::NotFound)?;

        for (column, value) in columns {
            row.insert(column, value);
        }
        row.insert("updated_at".to_string(), json!(epoch_ms()));
        Ok(row.clone())
    }

    async fn select(&self, table: &str, filters: &Record) -> Result<Vec<Record>, StoreError> {
        let rows = match self.tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };
        Ok(rows
            .iter()
            .filter(|entry| Self::matches(entry.value(), filters))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn select_by_id(&self, table: &str, id: &str) -> Result<Record, StoreError> {
        let rows = self.tables.get(table).ok_or(StoreError::NotFound)?;
        let row = rows.get(id).ok_or(StoreError::NotFound)?;
        Ok(row.clone())
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn columns(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let row = store
            .insert("requests", columns(json!({"target_first_name": "John"})))
            .await
            .unwrap();

        let id = row.get("id").and_then(Value::as_str).unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert!(row.get("created_at").unwrap().is_u64());
        assert_eq!(store.count("requests"), 1);
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("requests", "no-such-id", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn update_merges_and_bumps_updated_at() {
        let store = MemoryStore::new();
        let row = store
            .insert("requests", columns(json!({"status": "missing"})))
            .await
            .unwrap();
        let id = row.get("id").and_then(Value::as_str).unwrap().to_string();

        let updated = store
            .update("requests", &id, columns(json!({"status": "found"})))
            .await
            .unwrap();
        assert_eq!(updated.get("status"), Some(&json!("found")));
        assert_eq!(updated.get("id"), Some(&json!(id)));
    }

    #[tokio::test]
    async fn select_applies_equality_filters() {
        let store = MemoryStore::new();
        store
            .insert("requests", columns(json!({"parish": "Kingston"})))
            .await
            .unwrap();
        store
            .insert("requests", columns(json!({"parish": "Portland"})))
            .await
            .unwrap();

        let all = store.select("requests", &Map::new()).await.unwrap();
        assert_eq!(all.len(), 2);

        let kingston = store
            .select("requests", &columns(json!({"parish": "Kingston"})))
            .await
            .unwrap();
        assert_eq!(kingston.len(), 1);

        let none = store
            .select("requests", &columns(json!({"parish": "Narnia"})))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn select_by_id_round_trip() {
        let store = MemoryStore::new();
        let row = store
            .insert("found_updates", columns(json!({"message_from_found_party": "safe"})))
            .await
            .unwrap();
        let id = row.get("id").and_then(Value::as_str).unwrap();

        let fetched = store.select_by_id("found_updates", id).await.unwrap();
        assert_eq!(fetched, row);

        let err = store
            .select_by_id("found_updates", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
