use clap::Args;
use gatepass_core::query::RawRequestFilter;
use gatepass_core::{Actor, ActorRole, WorkflowEngine};
use gatepass_db::{connect_with_config, migrations, SqlRequestRepository};

use crate::commands::{prepare, CommandResult};

/// Operator identity recorded on audit events for CLI reports.
const CLI_ACTOR_ID: &str = "gatepass-cli";

#[derive(Debug, Clone, Default, Args)]
pub struct ReportArgs {
    #[arg(long, help = "Only requests raised by this requester id")]
    pub requester_id: Option<String>,
    #[arg(long, help = "Only requests on this track: student or staff")]
    pub requester_role: Option<String>,
    #[arg(long, help = "Only requests whose final status matches: pending, approved, rejected")]
    pub status: Option<String>,
    #[arg(long, help = "Earliest creation time, RFC 3339 or YYYY-MM-DD")]
    pub from: Option<String>,
    #[arg(long, help = "Latest creation time, RFC 3339 or YYYY-MM-DD")]
    pub to: Option<String>,
}

impl From<ReportArgs> for RawRequestFilter {
    fn from(args: ReportArgs) -> Self {
        Self {
            requester_id: args.requester_id,
            requester_role: args.requester_role,
            status: args.status,
            start_date: args.from,
            end_date: args.to,
        }
    }
}

pub fn run(args: ReportArgs) -> CommandResult {
    let filter = match RawRequestFilter::from(args).parse() {
        Ok(filter) => filter,
        Err(error) => {
            return CommandResult::failure("report", "validation_error", error.to_string(), 2);
        }
    };

    let (config, runtime) = match prepare("report") {
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

        let engine = WorkflowEngine::new(SqlRequestRepository::new(pool.clone()));
        let actor = Actor::new(CLI_ACTOR_ID, ActorRole::Admin);
        let report = engine
            .report(&actor, filter)
            .await
            .map_err(|error| ("report_query", error.to_string(), 7u8));

        pool.close().await;
        report
    });

    match result {
        Ok(report) => {
            let message = format!("{} matching requests", report.count);
            match serde_json::to_value(&report) {
                Ok(data) => CommandResult::success_with_data("report", message, Some(data)),
                Err(error) => {
                    CommandResult::failure("report", "serialization", error.to_string(), 7)
                }
            }
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("report", error_class, message, exit_code)
        }
    }
}
