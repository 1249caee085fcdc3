use marketbot_db::{connect_with_settings, migrations};

use crate::commands::{prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        // One connection: an in-memory database is private to the connection that opened it.
        let pool = connect_with_settings(&config.database.url, 1, config.database.timeout_secs)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let applied = async {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;
            migrations::applied_count(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))
        }
        .await;
        pool.close().await;
        applied
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!(
                "schema up to date: {applied} of {} migrations applied",
                migrations::known_count()
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
