//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! Provider failures are grouped under [`LlmError`] and stream-specific
//! failures under [`AsyncProcessingError`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    InvalidPersona(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Image generation error: {0}")]
    ImageGeneration(String),

    #[error(transparent)]
    AsyncProcessing(#[from] AsyncProcessingError),

    #[error("Log store error: {0}")]
    LogStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether a retry of the same call has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Llm(e) => e.is_transient(),
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Failures reported by (or while talking to) the chat-completion provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM service error: {0}")]
    Service(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RateLimit(_) | LlmError::Service(_) => true,
            LlmError::Authentication(_) => false,
            LlmError::Api { status, .. } => *status == 408 || *status >= 500,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsyncProcessingError {
    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimit("slow down".to_string()).is_transient());
        assert!(LlmError::Service("empty".to_string()).is_transient());
        assert!(LlmError::Api {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());

        assert!(!LlmError::Authentication("bad key".to_string()).is_transient());
        assert!(!LlmError::Api {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_non_provider_errors_are_not_transient() {
        assert!(!Error::InvalidPersona("nope".to_string()).is_transient());
        assert!(!Error::ImageGeneration("boom".to_string()).is_transient());
    }

    #[test]
    fn test_nested_errors_display_transparently() {
        let err: Error = LlmError::Authentication("Invalid API key".to_string()).into();
        assert_eq!(err.to_string(), "Authentication failed: Invalid API key");

        let err: Error = AsyncProcessingError::Timeout("no delta for 5s".to_string()).into();
        assert_eq!(err.to_string(), "Timed out: no delta for 5s");
    }
}
