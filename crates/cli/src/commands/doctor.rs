use marketbot_core::config::{AppConfig, ChannelMode, LoadOptions};
use marketbot_db::{connect_with_settings, migrations, ping};
use serde::Serialize;

use crate::commands::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|e| e.to_string()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(loaded: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_channel(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            checks.push(DoctorCheck::skipped("channel_readiness"));
            checks.push(DoctorCheck::skipped("database_connectivity"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_channel(config: &AppConfig) -> DoctorCheck {
    let details = match config.channel.mode {
        ChannelMode::Http => format!(
            "bot token format validated; polling {} with {}s long polls",
            config.channel.api_base_url, config.channel.poll_timeout_secs
        ),
        ChannelMode::Noop => "noop channel: outbound messages are discarded".to_string(),
    };
    DoctorCheck { name: "channel_readiness", status: CheckStatus::Pass, details }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(&config.database.url, 1, config.database.timeout_secs)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        let outcome = async {
            ping(&pool).await.map_err(|error| format!("database did not answer: {error}"))?;
            // Never-migrated databases have no bookkeeping table yet.
            Ok::<i64, String>(migrations::applied_count(&pool).await.unwrap_or(0))
        }
        .await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(applied) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!(
                "connected using `{}`; {applied} of {} migrations applied",
                config.database.url,
                migrations::known_count()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use marketbot_core::config::{AppConfig, ChannelMode};

    use super::{build_report, render_human, CheckStatus};

    fn noop_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.channel.mode = ChannelMode::Noop;
        config.database.url = "sqlite::memory:".to_string();
        config
    }

    #[test]
    fn config_failure_skips_dependent_checks() {
        let report = build_report(Err("channel.bot_token is required".to_string()));
        assert_eq!(report.overall_status, CheckStatus::Fail);
        let statuses: Vec<_> = report.checks.iter().map(|check| check.status).collect();
        assert_eq!(statuses, vec![CheckStatus::Fail, CheckStatus::Skipped, CheckStatus::Skipped]);
        assert!(render_human(&report).contains("- [skip] database_connectivity"));
    }

    #[test]
    fn fresh_database_passes_with_no_migrations_applied() {
        let report = build_report(Ok(noop_memory_config()));
        assert_eq!(report.overall_status, CheckStatus::Pass);
        let database = report
            .checks
            .iter()
            .find(|check| check.name == "database_connectivity")
            .map(|check| check.details.clone())
            .unwrap_or_default();
        assert!(database.contains("0 of 1 migrations applied"), "{database}");
    }
}
