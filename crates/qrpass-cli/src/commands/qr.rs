//! QR code commands.

use crate::context::AppContext;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Args;
use qr_api::{GeneratePageRequest, GenerateQrRequest, QrApiError, QrResource};
use serde_json::Value;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Code type (ticket, url, text, ...)
    #[arg(short = 't', long = "type", default_value = "text")]
    pub kind: String,

    /// Payload as JSON; plain text is sent as a string
    #[arg(short, long, conflicts_with = "page")]
    pub payload: Option<String>,

    /// Generate a hosted page instead, with this title
    #[arg(long, requires = "content")]
    pub page: Option<String>,

    /// Page content (with --page)
    #[arg(long)]
    pub content: Option<String>,

    /// Invalidate after the first successful scan
    #[arg(long)]
    pub one_time: bool,

    /// Expire after this many minutes
    #[arg(long)]
    pub expires_in: Option<i64>,
}

/// Create a QR code.
pub async fn generate(ctx: &AppContext, args: GenerateArgs, format: OutputFormat) -> Result<()> {
    ctx.ensure_authenticated(format).await?;
    let expires_at = args.expires_in.map(|minutes| Utc::now() + Duration::minutes(minutes));

    let qr = match args.page {
        Some(title) => {
            let request = GeneratePageRequest {
                title,
                content: args.content.unwrap_or_default(),
                one_time: args.one_time,
                expires_at,
            };
            ctx.qr.generate_page(&request).await
        }
        None => {
            let payload = match args.payload {
                Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                None => Value::Null,
            };
            let request = GenerateQrRequest {
                kind: args.kind,
                payload,
                one_time: args.one_time,
                expires_at,
            };
            ctx.qr.generate(&request).await
        }
    }
    .context("Failed to generate QR code")?;

    output::print(&qr, || describe(&qr), format);
    Ok(())
}

/// List codes created by the current user.
pub async fn history(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    ctx.ensure_authenticated(format).await?;
    let codes = ctx.qr.history().await.context("Failed to load history")?;

    match format {
        OutputFormat::Text => {
            if codes.is_empty() {
                println!("No QR codes yet.");
                return Ok(());
            }
            output::print_heading(&format!("{} QR code(s)", codes.len()));
            for qr in &codes {
                println!(
                    "  {:<26} {:<10} {:<8} {}",
                    qr.id,
                    qr.kind.as_deref().unwrap_or("-"),
                    status_label(qr),
                    qr.created_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&codes)?),
    }
    Ok(())
}

/// Show one code.
pub async fn show(ctx: &AppContext, id: &str, format: OutputFormat) -> Result<()> {
    ctx.ensure_authenticated(format).await?;
    let qr = ctx.qr.get(id).await.context("Failed to load QR code")?;
    output::print(&qr, || describe(&qr), format);
    Ok(())
}

/// Delete one code.
pub async fn delete(ctx: &AppContext, id: &str, format: OutputFormat) -> Result<()> {
    ctx.ensure_authenticated(format).await?;
    ctx.qr.delete(id).await.context("Failed to delete QR code")?;
    output::print_success(&format!("Deleted {}", id), format);
    Ok(())
}

/// Validate a code typed or pasted by the user.
pub async fn validate(ctx: &AppContext, code: &str, format: OutputFormat) -> Result<()> {
    ctx.ensure_authenticated(format).await?;
    report_validation(ctx, code, format).await
}

/// Validate `code` and print the outcome. Rejections are reported, not returned.
pub(crate) async fn report_validation(
    ctx: &AppContext,
    code: &str,
    format: OutputFormat,
) -> Result<()> {
    match ctx.qr.validate(code).await {
        Ok(outcome) => {
            match format {
                OutputFormat::Text => {
                    println!("Valid: {}", outcome.message);
                    if let Some(qr) = &outcome.qr {
                        output::print_row("ID", &qr.id);
                        output::print_row("Type", qr.kind.as_deref().unwrap_or("-"));
                    }
                }
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "code": code,
                        "message": outcome.message,
                        "qr": outcome.qr,
                    })
                ),
            }
            Ok(())
        }
        Err(QrApiError::ValidationRejected(message)) => {
            match format {
                OutputFormat::Text => println!("Invalid: {}", message),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "valid": false, "code": code, "message": message })
                ),
            }
            Ok(())
        }
        Err(e) if e.requires_login() => Err(e).context("Session expired, log in again"),
        Err(e) => Err(e).context("Validation request failed"),
    }
}

fn status_label(qr: &QrResource) -> &'static str {
    if qr.is_usable_at(Utc::now()) {
        "active"
    } else if qr.validated_at.is_some() {
        "used"
    } else {
        "expired"
    }
}

fn describe(qr: &QrResource) -> String {
    let mut lines = vec![
        format!("  {:<12} {}", "ID:", qr.id),
        format!("  {:<12} {}", "Code:", qr.code),
        format!("  {:<12} {}", "Type:", qr.kind.as_deref().unwrap_or("-")),
        format!("  {:<12} {}", "Status:", status_label(qr)),
        format!("  {:<12} {}", "One-time:", if qr.one_time { "yes" } else { "no" }),
    ];
    if let Some(expires_at) = qr.expires_at {
        lines.push(format!("  {:<12} {}", "Expires:", expires_at.to_rfc3339()));
    }
    if let Some(payload) = qr.payload.as_ref().filter(|p| !p.is_null()) {
        lines.push(format!("  {:<12} {}", "Payload:", payload));
    }
    lines.join("\n")
}
