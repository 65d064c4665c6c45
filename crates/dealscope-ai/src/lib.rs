//! Extraction-service seam for dealscope.
//!
//! The pipeline talks to an [`ExtractionService`]: a system prompt, a user
//! prompt and document payloads in, one JSON object out. [`OpenAiClient`]
//! implements it over an OpenAI-compatible chat-completions endpoint and
//! [`FallbackService`] retries eligible failures on a second model.

pub mod error;
pub mod fallback;
pub mod json;
pub mod openai;
pub mod prompts;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;
pub mod service;

pub use error::ServiceError;
pub use fallback::FallbackService;
pub use json::parse_json_object;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use prompts::{DefaultPrompts, FLAG_CALIBRATION, OverridePrompts, PromptKey, PromptProvider};
#[cfg(any(test, feature = "testing"))]
pub use scripted::ScriptedService;
pub use service::{
    DocumentPayload, ExtractionRequest, ExtractionService, PdfDetail, ServiceResponse,
};
