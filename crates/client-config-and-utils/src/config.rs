//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Default API base URL (can be overridden at compile time via QRPASS_API_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("QRPASS_API_URL") {
    Some(url) => url,
    None => "http://localhost:4000/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_REFRESH_LEAD_SECS: u64 = 60;
const DEFAULT_SCAN_COOLDOWN_MS: u64 = 800;
const DEFAULT_ROI_FRACTION: f32 = 0.65;
const DEFAULT_INITIAL_ZOOM: f64 = 2.0;

/// Where the long-lived refresh credential lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTokenPersistence {
    /// Server-set cookie carried by the HTTP client's cookie jar.
    /// The client never reads the value.
    #[default]
    Cookie,
    /// Client-readable file store, sent explicitly on refresh.
    LocalStorage,
}

impl FromStr for RefreshTokenPersistence {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "local_storage" | "local-storage" | "local" => Ok(Self::LocalStorage),
            other => Err(CoreError::Config(format!(
                "Unknown refresh token persistence: {}",
                other
            ))),
        }
    }
}

/// Camera scanning defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Minimum spacing between accepted decodes (milliseconds).
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Minimum time before the same value is accepted again.
    /// Falls back to `cooldown_ms` when unset.
    #[serde(default)]
    pub repeat_cooldown_ms: Option<u64>,
    /// Side of the centred acceptance square as a fraction of the shorter frame edge.
    #[serde(default = "default_roi_fraction")]
    pub roi_fraction: f32,
    /// Keep scanning after the first accepted code.
    #[serde(default = "default_continuous")]
    pub continuous: bool,
    /// Zoom applied after the camera opens, clamped to the device range.
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: f64,
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_SCAN_COOLDOWN_MS
}

fn default_roi_fraction() -> f32 {
    DEFAULT_ROI_FRACTION
}

fn default_continuous() -> bool {
    true
}

fn default_initial_zoom() -> f64 {
    DEFAULT_INITIAL_ZOOM
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_SCAN_COOLDOWN_MS,
            repeat_cooldown_ms: None,
            roi_fraction: DEFAULT_ROI_FRACTION,
            continuous: true,
            initial_zoom: DEFAULT_INITIAL_ZOOM,
        }
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL every API path is resolved against.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Refresh credential storage policy.
    #[serde(default)]
    pub refresh_persistence: RefreshTokenPersistence,
    /// How long before access-token expiry the proactive refresh fires.
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    /// Camera scanning defaults.
    #[serde(default)]
    pub scan: ScanSettings,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_refresh_lead_secs() -> u64 {
    DEFAULT_REFRESH_LEAD_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_persistence: RefreshTokenPersistence::default(),
            refresh_lead_secs: DEFAULT_REFRESH_LEAD_SECS,
            scan: ScanSettings::default(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `QRPASS_*` overrides from `lookup`. Invalid values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(log_level) = non_empty("QRPASS_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = non_empty("QRPASS_API_URL") {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = non_empty("QRPASS_REFRESH_PERSISTENCE") {
            match raw.parse() {
                Ok(policy) => self.refresh_persistence = policy,
                Err(e) => tracing::warn!(error = %e, "Ignoring QRPASS_REFRESH_PERSISTENCE"),
            }
        }
    }

    /// Get the API base URL as a parsed URL.
    ///
    /// A trailing slash is enforced so relative paths join under it.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let raw = self.api_base_url.trim();
        let normalized = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{}/", raw)
        };
        Url::parse(&normalized).map_err(CoreError::from)
    }

    /// Refresh lead time as a duration.
    pub fn refresh_lead(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_lead_secs)
    }
}
