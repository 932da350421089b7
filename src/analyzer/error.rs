use std::time::Duration;

use thiserror::Error;

/// Failures of the external model call. Every variant is recoverable: the
/// analyzer substitutes a simulated result instead of propagating it.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no API key configured")]
    MissingCredentials,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub fn is_quota(&self) -> bool {
        matches!(self, ModelError::Api { status: 429, .. })
    }
}
