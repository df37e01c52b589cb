//! Typed client for the QR endpoints, built on the session's authenticated
//! fetch.

mod client;
mod error;
mod models;

pub use client::QrClient;
pub use error::{QrApiError, QrApiResult, VALIDATION_FALLBACK_MESSAGE};
pub use models::{GeneratePageRequest, GenerateQrRequest, QrResource, ValidationOutcome};
