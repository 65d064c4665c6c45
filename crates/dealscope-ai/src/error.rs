use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service call timed out")]
    Timeout,

    #[error("model {model} is unavailable")]
    ModelUnavailable { model: String },

    #[error("response is not a JSON object: {0}")]
    MalformedResponse(String),

    #[error("service returned an empty response")]
    EmptyResponse,

    #[error("service misconfigured: {0}")]
    Config(String),
}

impl ServiceError {
    /// Whether retrying on the fallback model could help.
    pub fn is_fallback_eligible(&self) -> bool {
        match self {
            Self::ModelUnavailable { .. }
            | Self::Timeout
            | Self::Http(_)
            | Self::MalformedResponse(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyResponse | Self::Config(_) => false,
        }
    }
}
