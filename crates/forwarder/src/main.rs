//! Notification Forwarder CLI
//!
//! Reads an S3 event notification from a file or stdin and forwards the
//! uploaded object's bucket and key to the Rollcall webhook.

use std::io::Read as _;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;

use rollcall_forwarder::{extract_event, forward};

#[derive(Parser)]
#[command(
    name = "rollcall-forwarder",
    version,
    about = "Forward S3 upload notifications to the Rollcall webhook",
    after_help = "EXAMPLES:\n  \
                  # Forward a notification document\n  \
                  rollcall-forwarder event.json\n\n  \
                  # Read the notification from stdin\n  \
                  cat event.json | rollcall-forwarder -\n\n  \
                  # Explicit webhook URL\n  \
                  rollcall-forwarder --url http://localhost:8080/webhook event.json"
)]
struct Cli {
    /// Notification document, or "-" for stdin
    notification: PathBuf,

    /// Webhook URL to forward to
    #[arg(
        long,
        env = "ROLLCALL_FORWARD_URL",
        default_value = "http://127.0.0.1:8080/webhook"
    )]
    url: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let document = if cli.notification.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read notification from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&cli.notification)
            .with_context(|| format!("Failed to read {}", cli.notification.display()))?
    };

    let event = extract_event(&document)?;
    tracing::info!("Forwarding s3://{}/{} to {}", event.bucket, event.key, cli.url);

    let body = forward(&cli.url, &event).await?;
    println!("{body}");

    Ok(())
}
