//! QR resource shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A QR code as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrResource {
    #[serde(alias = "_id")]
    pub id: String,
    pub code: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub one_time: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default)]
    pub creator: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl QrResource {
    /// Whether the code can still be validated at `now`.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        if !self.is_valid {
            return false;
        }
        if self.one_time && self.validated_at.is_some() {
            return false;
        }
        self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// Request body for generating a plain QR code.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
    pub one_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for generating a QR code that points at a hosted page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePageRequest {
    pub title: String,
    pub content: String,
    pub one_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub qr: Option<QrResource>,
    pub message: String,
}
