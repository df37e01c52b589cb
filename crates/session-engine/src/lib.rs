//! Session engine for the qrpass client.
//!
//! This crate provides:
//! - Login, signup and logout against the authentication endpoints
//! - Single-flight token refresh shared by all concurrent callers
//! - Proactive refresh ahead of access-token expiry
//! - `authenticated_fetch`, the one request primitive every API call uses
//! - An explicit FSM (`Anonymous`, `Authenticated`, `Refreshing`)

mod endpoints;
mod error;
mod models;
mod session;
mod session_fsm;
pub mod token;

pub use endpoints::{resolve, AuthEndpoints};
pub use error::{ApiBody, ApiError, AuthError, AuthResult};
pub use models::{
    AuthResponse, Credentials, FetchOptions, SessionSnapshot, SignupProfile, UserProfile,
};
pub use session::{SessionConfig, SessionManager, DEFAULT_REFRESH_LEAD};
pub use session_fsm::session_machine;
pub use session_fsm::{
    RefreshConfig, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
