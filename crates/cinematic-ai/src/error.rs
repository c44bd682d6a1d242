//! Completion errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Error object returned by the endpoint
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("API key missing or rejected")]
    InvalidApiKey,

    /// The prompt did not fit the model's context window
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Whether the same request may succeed if sent again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::RateLimited { .. } => true,
            Error::Api { error_type, message } => {
                let error_type = error_type.to_lowercase();
                ["rate_limit", "server_error", "overloaded", "timeout"]
                    .iter()
                    .any(|t| error_type.contains(t))
                    || message.to_lowercase().contains("too many requests")
            }
            _ => false,
        }
    }

    /// Seconds the endpoint asked us to wait before retrying
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
