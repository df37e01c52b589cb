//! Output formatting for the CLI.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print `value` as pretty JSON, or `text` in text mode.
pub fn print<T: Serialize>(value: &T, text: impl FnOnce() -> String, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", text()),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", text()),
        },
    }
}

/// Print a success message.
pub fn print_success(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => println!("{}", json!({ "status": "success", "message": message })),
    }
}

/// Print an error message.
pub fn print_error(message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("Error: {}", message),
        OutputFormat::Json => eprintln!("{}", json!({ "status": "error", "message": message })),
    }
}

/// Print a table row.
pub fn print_row(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", label), value);
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "-".repeat(50));
}

/// Print a heading.
pub fn print_heading(text: &str) {
    println!("\n{}", text);
    print_divider();
}
