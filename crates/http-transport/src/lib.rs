//! Low-level HTTP request primitive.
//!
//! [`HttpTransport`] is the single seam between the API clients and the
//! network. Production code uses [`ReqwestTransport`]; tests enable the
//! `testing` feature and script responses with `testing::ScriptedTransport`.

mod client;
mod error;
mod message;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::ReqwestTransport;
pub use error::{TransportError, TransportResult};
pub use message::{HttpRequest, HttpResponse};
pub use reqwest::Method;

use async_trait::async_trait;

/// Sends one request and reads the whole response.
///
/// Non-2xx statuses are responses, not errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse>;
}
