//! Session error types.

use http_transport::{HttpResponse, TransportError};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Body of a failed API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ApiBody {
    pub fn from_response(response: &HttpResponse) -> Self {
        if response.is_empty() {
            return ApiBody::Empty;
        }
        match response.json_body() {
            Some(value) => ApiBody::Json(value),
            None => ApiBody::Text(response.text_body()),
        }
    }

    /// Server-provided human readable message, if any.
    ///
    /// Looks at `message` then `error` in JSON bodies; plain text bodies are
    /// returned as-is.
    pub fn message(&self) -> Option<String> {
        match self {
            ApiBody::Json(value) => ["message", "error"]
                .iter()
                .filter_map(|key| value.get(key))
                .find_map(|v| v.as_str().map(str::to_string)),
            ApiBody::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ApiBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiBody::Json(value) => write!(f, "{}", value),
            ApiBody::Text(text) => write!(f, "{}", text),
            ApiBody::Empty => write!(f, "<empty>"),
        }
    }
}

/// A non-2xx response that was not recovered by a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiError {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            body: ApiBody::from_response(response),
        }
    }

    pub fn message(&self) -> Option<String> {
        self.body.message()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.body)
    }
}

impl std::error::Error for ApiError {}

/// Session error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Login or signup rejected by the server
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Refresh was impossible or a refreshed request was still unauthorized
    #[error("Session expired")]
    SessionExpired,

    /// Refresh endpoint rejected the credential
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Any other non-2xx response
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// No response was obtained
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response was well-formed JSON but not the expected shape
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] credential_storage::StorageError),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors are connection failures, timeouts and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Transport(e) => e.is_transient(),
            AuthError::Api(e) => e.status >= 500,
            _ => false,
        }
    }

    /// Returns true if the caller should send the user back to a login view.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::SessionExpired | AuthError::RefreshFailed(_)
        )
    }

    /// Status code of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Api(e) => Some(e.status),
            _ => None,
        }
    }
}

impl From<client_config_and_utils::CoreError> for AuthError {
    fn from(err: client_config_and_utils::CoreError) -> Self {
        AuthError::Config(err.to_string())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
