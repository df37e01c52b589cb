#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use client_config_and_utils::RefreshTokenPersistence;
use credential_storage::{MemoryStorage, RefreshCredentials};
use http_transport::testing::ScriptedTransport;
use http_transport::{HttpResponse, HttpTransport, Method};
use serde_json::json;
use session_engine::{SessionConfig, SessionManager};
use std::sync::Arc;
use url::Url;

pub const BASE_URL: &str = "http://api.test/api/";

/// An unsigned JWT expiring `expires_in` seconds from now.
pub fn jwt(expires_in: i64, subject: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + expires_in;
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "sub": subject }).to_string())
    )
}

pub fn config() -> SessionConfig {
    SessionConfig::new(Url::parse(BASE_URL).expect("valid base url"))
}

/// Session using cookie-held refresh tokens.
pub fn cookie_session(transport: &Arc<ScriptedTransport>) -> SessionManager {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    SessionManager::new(transport, RefreshCredentials::cookie(), config())
}

/// Session storing refresh tokens in `storage`.
pub fn local_session(
    transport: &Arc<ScriptedTransport>,
    storage: Arc<MemoryStorage>,
) -> SessionManager {
    let transport: Arc<dyn HttpTransport> = transport.clone();
    SessionManager::new(
        transport,
        RefreshCredentials::new(RefreshTokenPersistence::LocalStorage, storage),
        config(),
    )
}

pub fn auth_body(access_token: &str) -> serde_json::Value {
    json!({
        "accessToken": access_token,
        "refreshToken": "refresh-1",
        "user": { "id": "user-1", "email": "ada@example.com", "name": "Ada" }
    })
}

/// Answer the login endpoint with `access_token`.
pub fn accept_login(transport: &ScriptedTransport, access_token: &str) {
    let body = auth_body(access_token);
    transport.on(Method::POST, "/auth/login", move |_| HttpResponse::json(200, &body));
}

/// Answer the refresh endpoint with `access_token`.
pub fn accept_refresh(transport: &ScriptedTransport, access_token: &str) {
    let body = json!({ "accessToken": access_token });
    transport.on(Method::POST, "/auth/refresh", move |_| HttpResponse::json(200, &body));
}

/// Serve the history only to requests carrying `valid_token`.
pub fn history_for(transport: &ScriptedTransport, valid_token: &str) {
    let valid = valid_token.to_string();
    transport.on(Method::GET, "/qr/history", move |req| {
        if req.bearer_token() == Some(valid.as_str()) {
            HttpResponse::json(200, &json!([{ "id": "qr-1", "code": "ABC123" }]))
        } else {
            HttpResponse::json(401, &json!({ "message": "Token expired" }))
        }
    });
}
