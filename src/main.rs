use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meridian::cli;
use meridian::daemon::Daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let settings = cli::Cli::parse().into_settings();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "meridian=debug,tower_http=debug".into());
    if settings.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!(
        "Starting Meridian in region {} with {} peer(s) in other regions",
        settings.region,
        settings.regions.len()
    );
    let mut daemon = Daemon::spawn(settings).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    daemon.close().await;

    Ok(())
}
