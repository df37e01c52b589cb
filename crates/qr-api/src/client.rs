//! QR endpoint client.

use crate::error::{QrApiError, QrApiResult, VALIDATION_FALLBACK_MESSAGE};
use crate::models::{GeneratePageRequest, GenerateQrRequest, QrResource, ValidationOutcome};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use session_engine::{AuthError, FetchOptions, SessionManager};
use tracing::{debug, info, warn};
use url::Url;

const GENERATE_PATH: &str = "qr/generate";
const GENERATE_PAGE_PATH: &str = "qr/generate-page";
const HISTORY_PATH: &str = "qr/history";
const VALIDATE_PATH: &str = "qr/validate";

/// Keys a single resource may be wrapped in.
const RESOURCE_ENVELOPES: &[&str] = &["qr", "qrCode", "data"];
/// Keys a resource list may be wrapped in.
const LIST_ENVELOPES: &[&str] = &["data", "history", "qrCodes", "items"];

/// Typed access to the QR endpoints. Every call goes through the session's
/// authenticated fetch.
#[derive(Debug, Clone)]
pub struct QrClient {
    session: SessionManager,
}

impl QrClient {
    pub fn new(session: SessionManager) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub async fn generate(&self, request: &GenerateQrRequest) -> QrApiResult<QrResource> {
        let body = serde_json::to_value(request)?;
        let qr: QrResource = self
            .fetch_resource(GENERATE_PATH, FetchOptions::post(body))
            .await?;
        info!(qr_id = %qr.id, one_time = qr.one_time, "Generated QR code");
        Ok(qr)
    }

    pub async fn generate_page(&self, request: &GeneratePageRequest) -> QrApiResult<QrResource> {
        let body = serde_json::to_value(request)?;
        let qr: QrResource = self
            .fetch_resource(GENERATE_PAGE_PATH, FetchOptions::post(body))
            .await?;
        info!(qr_id = %qr.id, "Generated page QR code");
        Ok(qr)
    }

    pub async fn get(&self, id: &str) -> QrApiResult<QrResource> {
        let url = self.resource_url(id)?;
        self.fetch_resource(url.as_str(), FetchOptions::get()).await
    }

    pub async fn delete(&self, id: &str) -> QrApiResult<()> {
        let url = self.resource_url(id)?;
        self.session
            .authenticated_fetch(url.as_str(), FetchOptions::delete())
            .await?;
        info!(qr_id = %id, "Deleted QR code");
        Ok(())
    }

    /// Codes created by the current user.
    pub async fn history(&self) -> QrApiResult<Vec<QrResource>> {
        let value = self
            .session
            .authenticated_fetch(HISTORY_PATH, FetchOptions::get())
            .await?
            .ok_or(QrApiError::EmptyResponse(HISTORY_PATH))?;
        let list = unwrap_envelope(value, LIST_ENVELOPES, Value::is_array);
        Ok(serde_json::from_value(list)?)
    }

    /// Validate a scanned code.
    ///
    /// A rejection (4xx, or a 2xx body flagged invalid) becomes
    /// [`QrApiError::ValidationRejected`] carrying the server's message, or a
    /// generic one when the server gave none.
    pub async fn validate(&self, code: &str) -> QrApiResult<ValidationOutcome> {
        debug!(code_len = code.len(), "Validating QR code");
        let result = self
            .session
            .authenticated_fetch(VALIDATE_PATH, FetchOptions::post(json!({ "code": code })))
            .await;

        let value = match result {
            Ok(value) => value.unwrap_or(Value::Null),
            Err(AuthError::Api(error)) if (400..500).contains(&error.status) => {
                let message = error
                    .message()
                    .unwrap_or_else(|| VALIDATION_FALLBACK_MESSAGE.to_string());
                warn!(status = error.status, message = %message, "QR code rejected");
                return Err(QrApiError::ValidationRejected(message));
            }
            Err(e) => return Err(e.into()),
        };

        let message = server_message(&value);
        // A bare resource may carry `isValid: false` once a one-time code is consumed.
        let flagged_invalid = !is_resource(&value)
            && ["valid", "isValid", "success"]
                .iter()
                .any(|key| value.get(key).and_then(Value::as_bool) == Some(false));
        if flagged_invalid {
            let message = message.unwrap_or_else(|| VALIDATION_FALLBACK_MESSAGE.to_string());
            warn!(message = %message, "QR code rejected");
            return Err(QrApiError::ValidationRejected(message));
        }

        let resource = unwrap_envelope(value, RESOURCE_ENVELOPES, is_resource);
        let qr = serde_json::from_value::<QrResource>(resource).ok();
        info!(qr_id = qr.as_ref().map(|q| q.id.as_str()), "QR code validated");

        Ok(ValidationOutcome {
            qr,
            message: message.unwrap_or_else(|| "QR code validated".to_string()),
        })
    }

    /// `<base>/qr/<id>` with the id encoded as a single path segment.
    fn resource_url(&self, id: &str) -> QrApiResult<Url> {
        if matches!(id, "" | "." | "..") {
            return Err(QrApiError::InvalidId(id.to_string()));
        }
        let mut url = self.session.base_url().clone();
        url.path_segments_mut()
            .map_err(|_| QrApiError::InvalidId(id.to_string()))?
            .pop_if_empty()
            .push("qr")
            .push(id);
        Ok(url)
    }

    async fn fetch_resource<T: DeserializeOwned>(
        &self,
        path: &str,
        options: FetchOptions,
    ) -> QrApiResult<T> {
        let value = self
            .session
            .authenticated_fetch(path, options)
            .await?
            .ok_or(QrApiError::EmptyResponse("QR resource"))?;
        let resource = unwrap_envelope(value, RESOURCE_ENVELOPES, is_resource);
        Ok(serde_json::from_value(resource)?)
    }
}

/// Strip a `{ "<key>": ... }` wrapper unless the value already looks like
/// the payload.
fn unwrap_envelope(value: Value, keys: &[&str], is_payload: impl Fn(&Value) -> bool) -> Value {
    if is_payload(&value) {
        return value;
    }
    match value {
        Value::Object(mut map) => {
            for key in keys {
                if let Some(inner) = map.remove(*key) {
                    return inner;
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// A bare QR resource rather than an envelope or a status body.
fn is_resource(value: &Value) -> bool {
    (value.get("id").is_some() || value.get("_id").is_some()) && value.get("code").is_some()
}

fn server_message(value: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(|v| v.as_str().map(str::to_string))
}
