//! Telehook daemon
//!
//! Relays Asterisk AMI or ARI events to a webhook. Exits non-zero when the
//! session ends so a supervisor can restart it, unless reconnect is enabled.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use th_core::config::{Protocol, RelayConfig};
use th_forwarder::{connect_source, Relay};

#[derive(Parser)]
#[command(name = "telehook")]
#[command(about = "Forward Asterisk AMI/ARI events to a webhook")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source protocol: ami or ari (overrides config and environment)
    #[arg(short, long)]
    protocol: Option<Protocol>,

    /// Webhook URL (overrides config and environment)
    #[arg(short, long)]
    webhook_url: Option<String>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = RelayConfig::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(url) = args.webhook_url {
        config.webhook.url = url;
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e).context("Invalid configuration");
    }

    tracing::info!("Starting Asterisk {} webhook forwarder", config.protocol);
    config.log_summary();

    let relay = Relay::new(config.clone()).context("Failed to set up webhook client")?;

    let source = match connect_source(&config).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!("Failed to connect to Asterisk {}: {}", config.protocol, e);
            return Err(e).context("Failed to connect to Asterisk");
        }
    };

    let cancel = CancellationToken::new();
    let mut relay_task = tokio::spawn(relay.run(source, cancel.clone()));

    let result = tokio::select! {
        result = &mut relay_task => result,
        () = shutdown_signal() => {
            cancel.cancel();
            relay_task.await
        }
    };

    match result.context("Relay task panicked")? {
        Ok(()) => {
            tracing::info!("Forwarder shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Forwarder stopped: {}", e);
            Err(e.into())
        }
    }
}

/// Resolve once Ctrl+C or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
