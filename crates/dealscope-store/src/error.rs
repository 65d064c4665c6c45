use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    #[error("record for {table} has no value for conflict key {key}")]
    MissingConflictKey { table: String, key: String },

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
