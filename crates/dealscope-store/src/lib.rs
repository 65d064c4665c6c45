//! Storage layer: a small document-store seam with an in-memory backend and a
//! DuckDB backend, plus persistence of finished pipeline runs.

mod error;
mod memory;
mod persist;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use persist::{ANALYSES_TABLE, AUDIT_TABLE, PersistSummary, persist_run};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use async_trait::async_trait;
use serde_json::Value;

/// Equality filter on a top-level record field.
pub type Filter<'a> = (&'a str, Value);

/// Table-oriented JSON record store.
///
/// Records are JSON objects. Table names are restricted to
/// `[a-z0-9_]` since they end up in SQL.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert `record`, replacing any row whose `conflict_key` field matches.
    async fn upsert(&self, table: &str, record: Value, conflict_key: &str) -> Result<(), StoreError>;

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<usize, StoreError>;

    /// Records whose fields equal every filter value, in insertion order.
    async fn select(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<Value>, StoreError>;
}

pub(crate) fn validate_table(table: &str) -> Result<(), StoreError> {
    let ok = !table.is_empty()
        && table
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidTable(table.to_string()))
    }
}

pub(crate) fn matches(record: &Value, filters: &[Filter<'_>]) -> bool {
    filters.iter().all(|(field, want)| record.get(*field) == Some(want))
}

/// The value of `conflict_key` in `record`, rendered as a string key.
pub(crate) fn conflict_value(table: &str, record: &Value, conflict_key: &str) -> Result<String, StoreError> {
    match record.get(conflict_key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v) if !v.is_null() => Ok(v.to_string()),
        _ => Err(StoreError::MissingConflictKey {
            table: table.to_string(),
            key: conflict_key.to_string(),
        }),
    }
}
