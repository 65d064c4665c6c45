use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{DocumentStore, Filter, StoreError, conflict_value, matches, validate_table};

/// Process-local store. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, table: &str) -> usize {
        self.tables.lock().await.get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, table: &str, record: Value, conflict_key: &str) -> Result<(), StoreError> {
        validate_table(table)?;
        if !record.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let key = conflict_value(table, &record, conflict_key)?;

        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_default();
        let existing = rows.iter().position(|row| {
            conflict_value(table, row, conflict_key).is_ok_and(|k| k == key)
        });
        match existing {
            Some(i) => rows[i] = record,
            None => rows.push(record),
        }
        Ok(())
    }

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<usize, StoreError> {
        validate_table(table)?;
        if records.iter().any(|r| !r.is_object()) {
            return Err(StoreError::NotAnObject);
        }
        let n = records.len();
        self.tables
            .lock()
            .await
            .entry(table.to_string())
            .or_default()
            .extend(records);
        Ok(n)
    }

    async fn select(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<Value>, StoreError> {
        validate_table(table)?;
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, filters)).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn upsert_replaces_on_conflict_key() {
        let store = MemoryStore::new();
        store
            .upsert("legal_analyses", json!({"run_id": "r1", "status": "phase1"}), "run_id")
            .await
            .unwrap();
        store
            .upsert("legal_analyses", json!({"run_id": "r1", "status": "complete"}), "run_id")
            .await
            .unwrap();
        store
            .upsert("legal_analyses", json!({"run_id": "r2", "status": "error"}), "run_id")
            .await
            .unwrap();

        let rows = store.select("legal_analyses", &[]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["status"], "complete");
    }

    #[tokio::test]
    async fn insert_then_filtered_select() {
        let store = MemoryStore::new();
        let n = store
            .insert(
                "audit",
                vec![
                    json!({"run_id": "r1", "phase": 1}),
                    json!({"run_id": "r1", "phase": 2}),
                    json!({"run_id": "r2", "phase": 1}),
                ],
            )
            .await
            .unwrap();
        assert_eq!(n, 3);
        let r1 = store.select("audit", &[("run_id", json!("r1"))]).await.unwrap();
        assert_eq!(r1.len(), 2);
        assert_eq!(store.count("audit").await, 3);
        assert!(store.select("missing", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_objects_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.insert("audit", vec![json!([1, 2])]).await,
            Err(StoreError::NotAnObject)
        ));
        assert!(matches!(
            store.upsert("audit", json!({"x": 1}), "run_id").await,
            Err(StoreError::MissingConflictKey { .. })
        ));
    }
}
