pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::report::ReportArgs;

#[derive(Debug, Parser)]
#[command(
    name = "gatepass",
    about = "Gatepass operator CLI",
    long_about = "Operate the Gatepass request approval service: readiness, migrations, demo data, config inspection, and reporting.",
    after_help = "Examples:\n  gatepass doctor --json\n  gatepass seed\n  gatepass report --requester-role student --status pending"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo dataset covering every request state")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the admin request report as JSON")]
    Report(ReportArgs),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Report(args) => commands::report::run(args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
