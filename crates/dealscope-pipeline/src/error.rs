use dealscope_ai::ServiceError;
use dealscope_core::{CoreError, ExtractError};
use dealscope_store::StoreError;
use thiserror::Error;

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("no documents supplied")]
    NoDocuments,
}

/// Failures confined to one document, category or synthesis call.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("text extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("extraction service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("response does not match schema: {0}")]
    Schema(String),
}
