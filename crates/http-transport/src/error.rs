//! Transport error types.

use thiserror::Error;

/// Failure to obtain any HTTP response at all.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not reach the server
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request timed out (only when a caller layers a timeout on top)
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Request could not be built or sent
    #[error("Request failed: {0}")]
    Request(String),

    /// Response body could not be read
    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
