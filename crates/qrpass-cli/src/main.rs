//! qrpass CLI - generate, list and scan QR codes.

mod commands;
mod context;
mod frames;
mod output;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use context::AppContext;
use output::OutputFormat;
use std::path::PathBuf;
use tracing::debug;

/// qrpass CLI - manage and scan QR codes.
#[derive(Parser)]
#[command(name = "qrpass")]
#[command(about = "Generate, list, validate and scan QR codes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also print logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory for config, credentials and logs. Defaults to ~/.qrpass
    #[arg(long, global = true, env = "QRPASS_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login,

    /// Create an account
    Signup {
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Request a password reset email
    ForgotPassword {
        /// Account email
        email: Option<String>,
    },

    /// Set a new password with a reset token
    ResetPassword {
        /// Token from the reset email
        token: String,
    },

    /// List your QR codes
    History,

    /// Generate a QR code
    Generate(commands::GenerateArgs),

    /// Show QR code details
    Show {
        /// QR code ID
        id: String,
    },

    /// Delete a QR code
    Delete {
        /// QR code ID
        id: String,
    },

    /// Validate a code
    Validate {
        /// Scanned code value
        code: String,
    },

    /// Scan codes from a camera
    Scan(commands::ScanArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, Some(&paths), cli.verbose);
    debug!(base_dir = %paths.base_dir().display(), "Loaded configuration");

    let format = cli.format;
    let ctx = AppContext::build(config, paths)?;

    let result = match cli.command {
        Commands::Login => commands::login(&ctx, format).await,
        Commands::Signup { name } => commands::signup(&ctx, name, format).await,
        Commands::Logout => commands::logout(&ctx, format).await,
        Commands::Status => commands::status(&ctx, format).await,
        Commands::ForgotPassword { email } => {
            commands::forgot_password(&ctx, email, format).await
        }
        Commands::ResetPassword { token } => {
            commands::reset_password(&ctx, &token, format).await
        }
        Commands::History => commands::history(&ctx, format).await,
        Commands::Generate(args) => commands::generate(&ctx, args, format).await,
        Commands::Show { id } => commands::show(&ctx, &id, format).await,
        Commands::Delete { id } => commands::delete(&ctx, &id, format).await,
        Commands::Validate { code } => commands::validate(&ctx, &code, format).await,
        Commands::Scan(args) => commands::scan(&ctx, args, format).await,
    };

    ctx.shutdown();
    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
    Ok(())
}
