use marketbot_core::config::ChannelMode;
use marketbot_db::{connect_with_settings, ping};

use crate::commands::{prepare, CommandResult};

/// Preflight for `marketbot-server`: config, channel settings and database reachability.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let pinged = ping(&pool).await.map_err(|error| ("db_connectivity", error.to_string(), 4u8));
        pool.close().await;
        pinged
    });

    if let Err((error_class, message, exit_code)) = result {
        return CommandResult::failure("start", error_class, message, exit_code);
    }

    let channel = match config.channel.mode {
        ChannelMode::Http => format!("http via {}", config.channel.api_base_url),
        ChannelMode::Noop => "noop (messages are discarded)".to_string(),
    };
    CommandResult::success(
        "start",
        format!(
            "preflight passed: channel {channel}, follow-up after {}s, health on {}:{}; \
             launch `marketbot-server` to serve",
            config.followup.delay_secs,
            config.server.bind_address,
            config.server.health_check_port
        ),
    )
}
