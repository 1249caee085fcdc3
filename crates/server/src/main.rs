mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use marketbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use marketbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            db_pool: app.db_pool.clone(),
            sessions: app.assistant.sessions().clone(),
            channel_mode: app.config.channel.mode,
        },
    )
    .await?;

    tracing::info!(
        event_name = "system.server.channel_mode",
        channel_mode = app.config.channel.mode.as_str(),
        transport_mode = if app.runner.is_noop_transport() { "noop" } else { "polling" },
        followup_delay_secs = app.config.followup.delay_secs,
        correlation_id = "bootstrap",
        "channel transport initialized"
    );

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "marketbot-server started"
    );

    tokio::select! {
        result = app.runner.start() => {
            result?;
            if app.runner.is_noop_transport() {
                wait_for_shutdown().await?;
            }
        }
        result = wait_for_shutdown() => result?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.assistant.sessions().len().await,
        "marketbot-server stopping"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "database pool did not close within the grace period"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
