//! Error types for cinematic-agent

use thiserror::Error;

/// Result type alias using cinematic-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the completion layer
    #[error(transparent)]
    Ai(#[from] cinematic_ai::Error),

    /// An external collaborator (catalog, memory, web search) failed
    #[error("{service} error: {message}")]
    Service { service: String, message: String },

    /// The chat platform rejected a fetch, reply, or edit
    #[error("Platform error: {0}")]
    Platform(String),

    /// A generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a collaborator error
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }
}
