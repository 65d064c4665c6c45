//! DuckDB-backed document store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use duckdb::{Connection, params};
use serde_json::Value;
use tracing::{debug, info};

use crate::{DocumentStore, Filter, StoreError, conflict_value, matches, validate_table};

/// DuckDB store keeping one JSON record per row.
///
/// Every table has the shape `(id VARCHAR PRIMARY KEY, record VARCHAR)`.
/// Upserts key `id` on the record's conflict field; plain inserts get a
/// random id. Filters are applied after decoding.
///
/// Use [`open`](Self::open) for an ephemeral database and
/// [`open_persistent`](Self::open_persistent) for a file that survives restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened analysis store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))
    }

    fn ensure_table(conn: &Connection, table: &str) -> Result<(), StoreError> {
        validate_table(table)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (id VARCHAR PRIMARY KEY, record VARCHAR NOT NULL)"
        ))?;
        Ok(())
    }

    /// Number of rows in `table`; zero if it does not exist.
    pub fn count(&self, table: &str) -> Result<usize, StoreError> {
        validate_table(table)?;
        let conn = self.lock()?;
        if !Self::table_exists(&conn, table)? {
            return Ok(0);
        }
        let n: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
        let n: i64 = conn.query_row(
            "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }
}

#[async_trait]
impl DocumentStore for DuckStore {
    async fn upsert(&self, table: &str, record: Value, conflict_key: &str) -> Result<(), StoreError> {
        if !record.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let id = conflict_value(table, &record, conflict_key)?;
        let body = serde_json::to_string(&record)?;

        let conn = self.lock()?;
        Self::ensure_table(&conn, table)?;
        conn.execute(
            &format!(
                "INSERT INTO {table} (id, record) VALUES (?, ?) \
                 ON CONFLICT (id) DO UPDATE SET record = excluded.record"
            ),
            params![id, body],
        )?;
        debug!(table, id = %id, "upserted record");
        Ok(())
    }

    async fn insert(&self, table: &str, records: Vec<Value>) -> Result<usize, StoreError> {
        if records.iter().any(|r| !r.is_object()) {
            return Err(StoreError::NotAnObject);
        }
        let bodies = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let conn = self.lock()?;
        Self::ensure_table(&conn, table)?;
        let mut stmt = conn.prepare(&format!("INSERT INTO {table} (id, record) VALUES (?, ?)"))?;
        for body in &bodies {
            stmt.execute(params![uuid::Uuid::new_v4().to_string(), body])?;
        }
        debug!(table, count = bodies.len(), "inserted records");
        Ok(bodies.len())
    }

    async fn select(&self, table: &str, filters: &[Filter<'_>]) -> Result<Vec<Value>, StoreError> {
        validate_table(table)?;
        let conn = self.lock()?;
        if !Self::table_exists(&conn, table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!("SELECT record FROM {table} ORDER BY rowid"))?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        for body in bodies {
            let record: Value = serde_json::from_str(&body)?;
            if matches(&record, filters) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn open_in_memory_and_upsert() {
        let store = DuckStore::open().unwrap();
        store
            .upsert("legal_analyses", json!({"run_id": "r1", "status": "phase2"}), "run_id")
            .await
            .unwrap();
        store
            .upsert("legal_analyses", json!({"run_id": "r1", "status": "complete"}), "run_id")
            .await
            .unwrap();

        let rows = store.select("legal_analyses", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["status"], "complete");
        assert_eq!(store.count("legal_analyses").unwrap(), 1);
    }

    #[tokio::test]
    async fn insert_and_filter() {
        let store = DuckStore::open().unwrap();
        store
            .insert(
                "audit",
                vec![json!({"run_id": "a", "n": 1}), json!({"run_id": "b", "n": 2})],
            )
            .await
            .unwrap();
        let rows = store.select("audit", &[("run_id", json!("b"))]).await.unwrap();
        assert_eq!(rows, vec![json!({"run_id": "b", "n": 2})]);
    }

    #[tokio::test]
    async fn missing_table_selects_nothing() {
        let store = DuckStore::open().unwrap();
        assert!(store.select("nothing_here", &[]).await.unwrap().is_empty());
        assert_eq!(store.count("nothing_here").unwrap(), 0);
    }

    #[tokio::test]
    async fn persistent_store_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("dealscope.duckdb");
        {
            let store = DuckStore::open_persistent(&path).unwrap();
            store
                .upsert("legal_analyses", json!({"run_id": "r9"}), "run_id")
                .await
                .unwrap();
        }
        assert!(path.exists());
        let store = DuckStore::open_persistent(&path).unwrap();
        let rows = store
            .select("legal_analyses", &[("run_id", json!("r9"))])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn invalid_table_is_rejected() {
        let store = DuckStore::open().unwrap();
        assert!(matches!(
            store.insert("bad-name", vec![json!({})]).await,
            Err(StoreError::InvalidTable(_))
        ));
    }
}
