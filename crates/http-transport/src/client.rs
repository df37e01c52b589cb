//! reqwest-backed transport.

use crate::{HttpRequest, HttpResponse, HttpTransport, TransportError, TransportResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// Production transport.
///
/// The client keeps a cookie jar, so a server-set refresh cookie
/// accompanies every request. No timeout is configured.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> TransportResult<Self> {
        let http_client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Wrap an already-configured client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        tracing::trace!(method = %method, path = url.path(), "Sending request");

        let mut builder = self
            .http_client
            .request(method, url)
            .header("Accept", "application/json");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse::new(status, content_type, body))
    }
}
