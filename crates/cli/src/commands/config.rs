use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use marketbot_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let bot_token = redact_token(config.channel.bot_token.expose_secret());
    let entries = [
        ("database.url", config.database.url.clone(), "MARKETBOT_DATABASE_URL"),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            "MARKETBOT_DATABASE_MAX_CONNECTIONS",
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "MARKETBOT_DATABASE_TIMEOUT_SECS",
        ),
        ("channel.mode", config.channel.mode.as_str().to_string(), "MARKETBOT_CHANNEL_MODE"),
        ("channel.bot_token", bot_token, "MARKETBOT_BOT_TOKEN"),
        (
            "channel.api_base_url",
            config.channel.api_base_url.clone(),
            "MARKETBOT_CHANNEL_API_BASE_URL",
        ),
        (
            "channel.poll_timeout_secs",
            config.channel.poll_timeout_secs.to_string(),
            "MARKETBOT_CHANNEL_POLL_TIMEOUT_SECS",
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            "MARKETBOT_SERVER_BIND_ADDRESS",
        ),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "MARKETBOT_SERVER_HEALTH_CHECK_PORT",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "MARKETBOT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        (
            "followup.delay_secs",
            config.followup.delay_secs.to_string(),
            "MARKETBOT_FOLLOWUP_DELAY_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "MARKETBOT_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "MARKETBOT_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, value, env_key)| render_line(key, &value, source(key, env_key))),
    );
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = Path::new("config").join(DEFAULT_CONFIG_FILE);
    nested.exists().then_some(nested)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the public bot id and hides the secret half.
pub(crate) fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) if !bot_id.is_empty() => format!("{bot_id}:***"),
        _ => "<redacted>".to_string(),
    }
}
