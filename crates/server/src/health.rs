//! `GET /health`: database, schema and conversation readiness.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use marketbot_core::config::ChannelMode;
use marketbot_core::SessionStore;
use marketbot_db::{migrations, ping, DbPool};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub sessions: SessionStore,
    pub channel_mode: ChannelMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentCheck {
    pub ready: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: ComponentCheck,
    pub schema: ComponentCheck,
    pub channel_mode: &'static str,
    pub tracked_users: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint listening"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint stopped unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = match ping(&state.db_pool).await {
        Ok(()) => ComponentCheck { ready: true, detail: "ping succeeded".to_string() },
        Err(error) => ComponentCheck { ready: false, detail: format!("ping failed: {error}") },
    };
    let schema = if database.ready {
        schema_check(&state.db_pool).await
    } else {
        ComponentCheck { ready: false, detail: "skipped: database unreachable".to_string() }
    };

    let ready = database.ready && schema.ready;
    let report = HealthReport {
        status: if ready { "ready" } else { "degraded" },
        database,
        schema,
        channel_mode: state.channel_mode.as_str(),
        tracked_users: state.sessions.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(report))
}

async fn schema_check(pool: &DbPool) -> ComponentCheck {
    let known = migrations::known_count();
    match migrations::applied_count(pool).await {
        Ok(applied) => ComponentCheck {
            ready: usize::try_from(applied).is_ok_and(|applied| applied >= known),
            detail: format!("{applied} of {known} migrations applied"),
        },
        Err(error) => {
            ComponentCheck { ready: false, detail: format!("migration table unreadable: {error}") }
        }
    }
}
