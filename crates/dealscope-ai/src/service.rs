//! The extraction-service contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

/// Rendering fidelity hint for PDF payloads.
///
/// Advisory only: the OpenAI client sends PDFs as file parts, which take no
/// fidelity setting, so the hint never reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdfDetail {
    #[default]
    Low,
    High,
}

/// One document attached to a service call.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    Text { filename: String, text: String },
    Pdf {
        filename: String,
        data: Arc<[u8]>,
        detail: PdfDetail,
    },
}

impl DocumentPayload {
    pub fn filename(&self) -> &str {
        match self {
            Self::Text { filename, .. } | Self::Pdf { filename, .. } => filename,
        }
    }

    /// Payload size in bytes, for logging.
    pub fn size(&self) -> usize {
        match self {
            Self::Text { text, .. } => text.len(),
            Self::Pdf { data, .. } => data.len(),
        }
    }
}

/// A single structured-extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub payload: Vec<DocumentPayload>,
}

impl ExtractionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: DocumentPayload) -> Self {
        self.payload.push(payload);
        self
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.payload.iter().map(DocumentPayload::filename).collect()
    }
}

/// A parsed JSON object and the model that produced it.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub value: Value,
    pub model: String,
}

/// Structured extraction backed by a language model.
///
/// Responses are untrusted: callers must validate every field.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Model used for the first attempt.
    fn model(&self) -> &str;

    async fn extract(&self, request: &ExtractionRequest) -> Result<ServiceResponse, ServiceError>;
}
