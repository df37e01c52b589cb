//! Request and response shapes of the authentication endpoints.

use crate::session_fsm::SessionState;
use http_transport::Method;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Email/password credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Registration payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(deserialize_with = "string_or_number", alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Any other fields the server sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Login, signup and refresh responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(alias = "access_token", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Options for [`SessionManager::authenticated_fetch`](crate::SessionManager::authenticated_fetch).
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl FetchOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Observable view of the session: current user, current token and
/// whether a session restore is running.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<UserProfile>,
    pub access_token: Option<String>,
    pub loading: bool,
    pub state: SessionState,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            access_token: None,
            loading: false,
            state: SessionState::Anonymous,
        }
    }
}
