//! Access-token claims.
//!
//! The payload segment of the JWT is decoded without verifying the
//! signature; the server remains the authority on validity.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Claims the client cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenClaims {
    /// Decode the claims segment of `token`.
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// Expiry instant encoded in `token`.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    TokenClaims::decode(token)?.expires_at()
}

/// Time until a refresh should fire: `exp - now - lead`.
///
/// `None` when the token carries no expiry or the result is not positive.
pub fn refresh_delay(token: &str, now: DateTime<Utc>, lead: Duration) -> Option<Duration> {
    let exp = expires_at(token)?;
    let lead = chrono::Duration::from_std(lead).ok()?;
    (exp - now - lead)
        .to_std()
        .ok()
        .filter(|delay| !delay.is_zero())
}
