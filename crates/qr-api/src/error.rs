//! QR API error types.

use session_engine::AuthError;
use thiserror::Error;

/// Message shown when the server rejects a code without saying why.
pub const VALIDATION_FALLBACK_MESSAGE: &str = "This QR code could not be validated";

/// Errors from the QR endpoints.
#[derive(Error, Debug)]
pub enum QrApiError {
    /// Session or transport failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Response did not match the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A 2xx response without the expected body
    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    /// An id that cannot name a single QR resource
    #[error("Invalid QR code id: {0:?}")]
    InvalidId(String),

    /// The server refused to validate the code
    #[error("{0}")]
    ValidationRejected(String),
}

impl QrApiError {
    /// Returns true if the caller should send the user back to a login view.
    pub fn requires_login(&self) -> bool {
        matches!(self, QrApiError::Auth(e) if e.requires_login())
    }
}

/// Result type alias using QrApiError.
pub type QrApiResult<T> = Result<T, QrApiError>;
