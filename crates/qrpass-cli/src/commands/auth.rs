//! Authentication commands.

use crate::context::{prompt_credentials, prompt_line, AppContext};
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use serde_json::json;
use session_engine::SignupProfile;

/// Login with email and password.
pub async fn login(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    if let Some(user) = ctx.session.restore_session().await {
        output::print_success(
            &format!("Already logged in as {}", user.display_name()),
            format,
        );
        return Ok(());
    }

    let credentials = prompt_credentials()?;
    println!("Logging in...");

    match ctx.session.login(&credentials).await {
        Ok(user) => {
            output::print_success(&format!("Logged in as {}", user.display_name()), format)
        }
        Err(e) => output::print_error(&format!("Login failed: {}", e), format),
    }
    Ok(())
}

/// Create an account and log in.
pub async fn signup(ctx: &AppContext, name: Option<String>, format: OutputFormat) -> Result<()> {
    let credentials = prompt_credentials()?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if confirm != credentials.password {
        output::print_error("Passwords do not match", format);
        return Ok(());
    }

    let profile = SignupProfile {
        name,
        email: credentials.email,
        password: credentials.password,
    };
    match ctx.session.signup(&profile).await {
        Ok(user) => output::print_success(
            &format!("Account created, logged in as {}", user.display_name()),
            format,
        ),
        Err(e) => output::print_error(&format!("Signup failed: {}", e), format),
    }
    Ok(())
}

/// Logout and clear session.
pub async fn logout(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    // Restore first so the server-side session is revoked too.
    ctx.session.restore_session().await;
    ctx.session.logout().await;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Check authentication status.
pub async fn status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let user = ctx.session.restore_session().await;
    let snapshot = ctx.session.snapshot();

    match format {
        OutputFormat::Text => {
            println!("API:      {}", ctx.session.base_url());
            match &user {
                Some(user) => {
                    println!("Auth:     logged in");
                    println!("User:     {}", user.display_name());
                    println!("User ID:  {}", user.id);
                    if let Some(role) = &user.role {
                        println!("Role:     {}", role);
                    }
                }
                None => println!("Auth:     not logged in"),
            }
            println!("Logs:     {}", ctx.paths.log_file().display());
        }
        OutputFormat::Json => {
            let json = json!({
                "api": ctx.session.base_url().as_str(),
                "logged_in": user.is_some(),
                "state": snapshot.state,
                "user": user,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

/// Request a password reset email.
pub async fn forgot_password(
    ctx: &AppContext,
    email: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    ctx.session
        .request_password_reset(&email)
        .await
        .context("Password reset request failed")?;
    output::print_success("If that account exists, a reset link is on its way", format);
    Ok(())
}

/// Set a new password with a reset token.
pub async fn reset_password(ctx: &AppContext, token: &str, format: OutputFormat) -> Result<()> {
    let password = rpassword::prompt_password("New password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }
    ctx.session
        .confirm_password_reset(token, &password)
        .await
        .context("Password reset failed")?;
    output::print_success("Password updated, log in with the new password", format);
    Ok(())
}
