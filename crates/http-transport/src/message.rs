//! Request and response values exchanged with a transport.

use reqwest::Method;
use serde_json::Value;
use url::Url;

/// An outbound request. Bodies are always JSON.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace any existing Authorization header with a bearer token.
    pub fn bearer(mut self, token: &str) -> Self {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        self.headers
            .push(("Authorization".to_string(), format!("Bearer {}", token)));
        self
    }

    /// Look up a header value, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The bearer token carried by this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header_value("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    /// A JSON response.
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(
            status,
            Some("application/json".to_string()),
            body.to_string().into_bytes(),
        )
    }

    /// A plain-text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(
            status,
            Some("text/plain".to_string()),
            body.as_bytes().to_vec(),
        )
    }

    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, None, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// True when the body holds nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        self.body.iter().all(u8::is_ascii_whitespace)
    }

    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON, ignoring the declared content type.
    pub fn json_body(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}
