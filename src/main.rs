//! HubCommander CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt as _;
use hubcommander::config::{Config, Credentials};
use hubcommander::dispatcher::Dispatcher;
use hubcommander::messaging::MessagingDyn;
use hubcommander::messaging::slack::SlackAdapter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hubcommander")]
#[command(about = "A Slack bot for managing GitHub organizations")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    tracing::info!("Starting HubCommander...");

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    let credentials =
        Credentials::from_env().context("failed to read credentials from the environment")?;

    let registry = Arc::new(
        hubcommander::setup::build_registry(&config, &credentials)
            .context("failed to set up plugins")?,
    );

    let messaging: Arc<dyn MessagingDyn> = Arc::new(
        SlackAdapter::new(
            credentials.slack_bot_token.clone(),
            credentials.slack_app_token.clone(),
        )
        .context("failed to create slack adapter")?,
    );
    messaging
        .health_check()
        .await
        .context("slack api check failed")?;
    let mut inbound = messaging
        .start()
        .await
        .context("failed to start slack socket mode")?;

    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        config.slack.clone(),
        messaging.clone(),
    ));

    tracing::info!("HubCommander started successfully");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            message = inbound.next() => {
                let Some(message) = message else {
                    tracing::info!("Inbound stream ended");
                    break;
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.process_message(message).await;
                });
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    tracing::info!("Shutting down...");
    if let Err(error) = messaging.shutdown().await {
        tracing::warn!(%error, "slack adapter did not shut down cleanly");
    }

    tracing::info!("HubCommander stopped");
    Ok(())
}
