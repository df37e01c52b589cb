//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!                 LoginSuccess
//! ┌─────────────┐ ─────────────────────────────► ┌─────────────────┐
//! │  Anonymous  │                                 │  Authenticated  │
//! └─────────────┘ ◄───────────────────────────── └────────┬────────┘
//!    ▲     │        LogoutRequested / SessionExpired       │
//!    │     │ RefreshStarted (restore)       RefreshStarted │ (timer or 401)
//!    │     ▼                                               ▼
//!    │  ┌─────────────────────────────────────────────────────┐
//!    └──│                     Refreshing                      │
//!       └─────────────────────────────────────────────────────┘
//!        RefreshFailed ──► Anonymous    RefreshSuccess ──► Authenticated
//! ```
//!
//! Concurrent refresh triggers never reach the machine twice: they join the
//! flight already in progress.

use rust_fsm::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Anonymous)

    Anonymous => {
        LoginSuccess => Authenticated,
        // Restoring a session from a stored refresh credential
        RefreshStarted => Refreshing,
        LogoutRequested => Anonymous,
        SessionExpired => Anonymous
    },
    Authenticated => {
        // Logging in again replaces the session
        LoginSuccess => Authenticated,
        RefreshStarted => Refreshing,
        LogoutRequested => Anonymous,
        SessionExpired => Anonymous
    },
    Refreshing => {
        RefreshSuccess => Authenticated,
        RefreshFailed => Anonymous,
        LoginSuccess => Authenticated,
        LogoutRequested => Anonymous,
        SessionExpired => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Refreshing,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated => "authenticated",
            SessionState::Refreshing => "refreshing",
        }
    }
}

impl From<&SessionMachineState> for SessionState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Anonymous => SessionState::Anonymous,
            SessionMachineState::Authenticated => SessionState::Authenticated,
            SessionMachineState::Refreshing => SessionState::Refreshing,
        }
    }
}

/// Retry behaviour for transient refresh failures.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts within one refresh flight.
    pub max_attempts: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay after a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
