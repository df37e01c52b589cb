//! Wiring from configuration to a live session.

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use client_config_and_utils::{Config, Paths, RefreshTokenPersistence};
use credential_storage::create_refresh_credentials;
use http_transport::{HttpTransport, ReqwestTransport};
use qr_api::QrClient;
use session_engine::{Credentials, SessionConfig, SessionManager, UserProfile};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a command needs.
pub struct AppContext {
    pub config: Config,
    pub paths: Paths,
    pub session: SessionManager,
    pub qr: QrClient,
}

impl AppContext {
    pub fn build(config: Config, paths: Paths) -> Result<Self> {
        paths.ensure_dirs()?;
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new().context("Failed to build HTTP client")?);
        let credentials = create_refresh_credentials(&paths, config.refresh_persistence);
        let session_config = SessionConfig::from_config(&config)?;

        if config.refresh_persistence == RefreshTokenPersistence::Cookie {
            debug!("Refresh cookie lives in this process only");
        }
        info!(api = %session_config.base_url, "Session configured");

        let session = SessionManager::new(transport, credentials, session_config);
        let qr = QrClient::new(session.clone());
        Ok(Self {
            config,
            paths,
            session,
            qr,
        })
    }

    /// Restore from the stored refresh credential, prompting for a login
    /// when that fails and stdin is interactive.
    pub async fn ensure_authenticated(&self, format: OutputFormat) -> Result<UserProfile> {
        if let Some(user) = self.session.restore_session().await {
            return Ok(user);
        }
        if !io::stdin().is_terminal() {
            anyhow::bail!("Not logged in. Run 'qrpass login' first");
        }

        output::print_success("Authentication required.", format);
        let credentials = prompt_credentials()?;
        let user = self
            .session
            .login(&credentials)
            .await
            .context("Login failed")?;
        Ok(user)
    }

    /// Stop background work before exit.
    pub fn shutdown(&self) {
        self.session.dispose();
    }
}

/// Read an email from stdin and a password without echo.
pub fn prompt_credentials() -> Result<Credentials> {
    let email = prompt_line("Email: ")?;
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(Credentials::new(email, password))
}

pub fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
