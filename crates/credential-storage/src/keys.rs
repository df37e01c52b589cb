//! Storage key constants.

/// Storage keys used by the client.
pub struct StorageKeys;

impl StorageKeys {
    /// Long-lived refresh token (local storage policy only)
    pub const REFRESH_TOKEN: &'static str = "refresh_token";
}
