//! CLI command implementations.

mod auth;
mod qr;
mod scan;

pub use auth::{forgot_password, login, logout, reset_password, signup, status};
pub use qr::{delete, generate, history, show, validate, GenerateArgs};
pub use scan::{scan, ScanArgs};
