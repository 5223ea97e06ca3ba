//! Data-store collaborator interface.
//!
//! The gateway treats the underlying relational store as a generic CRUD
//! surface: insert, update-by-id, and select-with-equality-filters by
//! table name. "Row absent" is a typed [`StoreError::NotFound`] variant
//! so the pipeline never has to sniff a backend's magic error codes.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// A row, as a column-name → value map.
pub type Record = Map<String, Value>;

/// Errors surfaced by a data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target row does not exist.
    #[error("record not found")]
    NotFound,

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Generic CRUD data store.
///
/// Implementations own their connection handling and timeouts; the
/// pipeline only awaits the calls.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Insert a row and return it with server-set columns filled in.
    async fn insert(&self, table: &str, columns: Record) -> Result<Record, StoreError>;

    /// Update a row by id and return the updated row.
    async fn update(&self, table: &str, id: &str, columns: Record) -> Result<Record, StoreError>;

    /// Select rows matching every equality filter. An empty filter map
    /// selects everything.
    async fn select(&self, table: &str, filters: &Record) -> Result<Vec<Record>, StoreError>;

    /// Select a single row by id.
    async fn select_by_id(&self, table: &str, id: &str) -> Result<Record, StoreError>;
}
