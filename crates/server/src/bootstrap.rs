use std::sync::Arc;

use marketbot_agent::{Assistant, TokioScheduler};
use marketbot_channel::events::conversation_dispatcher;
use marketbot_channel::http::{BotApiClient, HttpBotChannel, HttpPollingTransport};
use marketbot_channel::outbound::{Channel, ChannelError, NoopChannel};
use marketbot_channel::runner::{NoopTransport, ReconnectPolicy, TransportRunner, UpdateTransport};
use marketbot_core::config::{AppConfig, ChannelConfig, ChannelMode, ConfigError, LoadOptions};
use marketbot_core::SessionStore;
use marketbot_db::{
    connect_with_settings, migrations, DbPool, MarketplaceRepository, SqlMarketplaceRepository,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub assistant: Arc<Assistant>,
    pub runner: TransportRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("channel client could not be built: {0}")]
    Channel(#[source] ChannelError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let (channel, transport) = channel_stack(&config.channel)?;
    let repository: Arc<dyn MarketplaceRepository> =
        Arc::new(SqlMarketplaceRepository::new(db_pool.clone()));
    let assistant = Arc::new(
        Assistant::new(repository, channel.clone(), Arc::new(TokioScheduler), SessionStore::new())
            .with_followup_delay(config.followup.delay()),
    );
    let runner = TransportRunner::new(
        transport,
        conversation_dispatcher(assistant.clone()),
        channel,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, assistant, runner })
}

type ChannelStack = (Arc<dyn Channel>, Arc<dyn UpdateTransport>);

fn channel_stack(config: &ChannelConfig) -> Result<ChannelStack, BootstrapError> {
    match config.mode {
        ChannelMode::Http => {
            let client = Arc::new(BotApiClient::new(config).map_err(BootstrapError::Channel)?);
            let transport = HttpPollingTransport::new(client.clone(), config.poll_timeout_secs);
            Ok((Arc::new(HttpBotChannel::new(client)), Arc::new(transport)))
        }
        ChannelMode::Noop => Ok((Arc::new(NoopChannel), Arc::new(NoopTransport))),
    }
}

#[cfg(test)]
mod tests {
    use marketbot_channel::events::EventContext;
    use marketbot_core::config::{ChannelMode, ConfigOverrides, LoadOptions};
    use marketbot_core::{Sender, UserId};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str, mode: ChannelMode, token: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                channel_mode: Some(mode),
                bot_token: token.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_bot_token_in_http_mode() {
        let result = bootstrap(overrides("sqlite::memory:", ChannelMode::Http, None)).await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("channel.bot_token"), "got: {message}");
    }

    #[tokio::test]
    async fn http_mode_builds_polling_transport() {
        let app = bootstrap(overrides(
            "sqlite::memory:",
            ChannelMode::Http,
            Some("123456:test-secret"),
        ))
        .await
        .expect("bootstrap with a well-formed token");

        assert!(!app.runner.is_noop_transport());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn noop_mode_wires_schema_and_a_working_assistant() {
        let app = bootstrap(overrides("sqlite::memory:?cache=shared", ChannelMode::Noop, None))
            .await
            .expect("bootstrap should succeed in noop mode");
        assert!(app.runner.is_noop_transport());

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('vendors', 'orders', 'ratings')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("marketplace tables exist after bootstrap");
        assert_eq!(table_count, 3);

        let owner = Sender::new(UserId(7));
        let ctx = EventContext::default();
        let reply = app.assistant.reply_to_text(&owner, "I want to register", &ctx).await;
        assert!(reply.render_text().contains("business name"));
        assert!(!app.assistant.sessions().snapshot(owner.id).await.is_idle());

        app.db_pool.close().await;
    }
}
