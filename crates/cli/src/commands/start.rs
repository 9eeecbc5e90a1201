//! Startup preflight. Serving HTTP is the job of the `gatepass-server` binary; this
//! command proves the same configuration would boot.

use crate::commands::{prepare, CommandResult};
use gatepass_db::{connect_with_config, migrations, SqlRequestRepository};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let requests = SqlRequestRepository::new(pool.clone())
            .count()
            .await
            .map_err(|error| ("schema_readiness", error.to_string(), 5u8))?;

        pool.close().await;
        Ok::<i64, (&'static str, String, u8)>(requests)
    });

    match result {
        Ok(requests) => CommandResult::success(
            "start",
            format!(
                "startup preflight passed ({requests} stored requests); gatepass-server would listen on {}:{}",
                config.server.bind_address, config.server.port
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}

