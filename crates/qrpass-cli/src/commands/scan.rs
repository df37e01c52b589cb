//! Live scanning.

use super::qr::report_validation;
use crate::context::AppContext;
use crate::frames::FrameDirectory;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use clap::Args;
use live_scan::{DecodedCallback, DecodedEvent, RqrrDecoder, ScanOptions, ScanPipeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const IDLE_CHECK: Duration = Duration::from_millis(250);

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory of captured frames; each sub-directory is one camera
    #[arg(long, default_value = "frames")]
    pub frames: PathBuf,

    /// Camera to use (sub-directory name)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Stop after the first accepted code
    #[arg(long)]
    pub once: bool,

    /// Delay between frames in milliseconds
    #[arg(long, default_value = "100")]
    pub interval_ms: u64,

    /// List cameras and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Decode only, skip server validation
    #[arg(long)]
    pub offline: bool,
}

/// Scan frames and validate every accepted code.
pub async fn scan(ctx: &AppContext, args: ScanArgs, format: OutputFormat) -> Result<()> {
    let camera = Arc::new(FrameDirectory::new(
        &args.frames,
        Duration::from_millis(args.interval_ms),
    ));
    let mut options = ScanOptions::from(&ctx.config.scan);
    if args.once {
        options.continuous = false;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<DecodedEvent>();
    let on_decoded: DecodedCallback = Arc::new(move |event: DecodedEvent| {
        let _ = tx.send(event);
    });
    let scanner = ScanPipeline::new(camera, Arc::new(RqrrDecoder::new()), options, on_decoded);

    if args.list_devices {
        let devices = scanner.list_devices().await?;
        match format {
            OutputFormat::Text => {
                output::print_heading("Cameras");
                for device in &devices {
                    output::print_row(&device.id, &device.label);
                }
            }
            OutputFormat::Json => {
                let ids: Vec<_> = devices
                    .iter()
                    .map(|d| serde_json::json!({ "id": d.id, "label": d.label }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&ids)?);
            }
        }
        return Ok(());
    }

    if !args.offline {
        ctx.ensure_authenticated(format).await?;
    }

    scanner
        .start(args.device.as_deref())
        .await
        .context("Failed to start camera")?;
    info!(device_id = ?scanner.active_device_id(), "Scanning");
    if format == OutputFormat::Text {
        println!(
            "Scanning {} (Ctrl+C to stop)...",
            scanner.active_device_id().unwrap_or_default()
        );
    }

    let mut idle = tokio::time::interval(IDLE_CHECK);
    let result = loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                if let Err(e) = handle_decoded(ctx, &args, &event, format).await {
                    break Err(e);
                }
            }
            _ = idle.tick() => {
                if !scanner.is_active() && rx.is_empty() {
                    break Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Scan interrupted");
                break Ok(());
            }
        }
    };

    scanner.stop();
    result
}

async fn handle_decoded(
    ctx: &AppContext,
    args: &ScanArgs,
    event: &DecodedEvent,
    format: OutputFormat,
) -> Result<()> {
    if args.offline {
        match format {
            OutputFormat::Text => println!("[{}] {}", event.timestamp.format("%H:%M:%S"), event.text),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "code": event.text, "timestamp": event.timestamp })
            ),
        }
        return Ok(());
    }

    report_validation(ctx, &event.text, format)
        .await
        .map_err(|e| {
            warn!(error = %e, "Validation failed during scan");
            e
        })
}
