//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::json::parse_json_object;
use crate::service::{DocumentPayload, ExtractionRequest, ExtractionService, ServiceResponse};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub fallback_model: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-5.1".into(),
            fallback_model: Some("gpt-4o".into()),
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

/// Extraction service over `POST {base_url}/chat/completions`.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ServiceError> {
        if config.api_key.trim().is_empty() {
            return Err(ServiceError::Config("OpenAI API key is not set".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// The same endpoint and credentials, addressing a different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }

    fn body(&self, request: &ExtractionRequest) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: Value::String(request.system_prompt.clone()),
                },
                ChatMessage {
                    role: "user",
                    content: user_content(request),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            max_completion_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ExtractionService for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ServiceResponse, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload_bytes: usize = request.payload.iter().map(DocumentPayload::size).sum();
        debug!(
            model = %self.model,
            documents = request.payload.len(),
            payload_bytes,
            "calling extraction service"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_status(&self.model, status.as_u16(), body));
        }

        let parsed: ChatResponse = resp.json().await.map_err(classify_transport)?;
        let content = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ServiceError::EmptyResponse)?;
        let value = parse_json_object(&content)?;

        let model = parsed.model.unwrap_or_else(|| self.model.clone());
        info!(model = %model, "extraction call complete");
        Ok(ServiceResponse { value, model })
    }
}

/// Prompt text followed by one content part per document.
fn user_content(request: &ExtractionRequest) -> Value {
    let mut parts = vec![json!({ "type": "text", "text": request.user_prompt })];
    for doc in &request.payload {
        match doc {
            DocumentPayload::Text { filename, text } => {
                parts.push(json!({
                    "type": "text",
                    "text": format!("=== DOCUMENT: {filename} ===\n{text}"),
                }));
            }
            // The file part has no fidelity knob; `detail` is not forwarded.
            DocumentPayload::Pdf { filename, data, .. } => {
                parts.push(json!({
                    "type": "file",
                    "file": {
                        "filename": filename,
                        "file_data": format!("data:application/pdf;base64,{}", STANDARD.encode(data)),
                    },
                }));
            }
        }
    }
    Value::Array(parts)
}

fn classify_transport(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout
    } else if err.is_decode() {
        ServiceError::MalformedResponse(err.to_string())
    } else {
        ServiceError::Http(err)
    }
}

fn classify_status(model: &str, status: u16, body: String) -> ServiceError {
    let lower = body.to_ascii_lowercase();
    let model_missing = lower.contains("model_not_found")
        || (status == 404 && lower.contains("model"))
        || lower.contains("does not exist");
    if model_missing {
        ServiceError::ModelUnavailable {
            model: model.to_string(),
        }
    } else {
        ServiceError::Status { status, body }
    }
}

// ── Wire types ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_completion_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Value,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
