pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ridehub_core::config::LoggingConfig;
use ridehub_core::{Actor, BucketField};

use crate::commands::action::{ActionArgs, ActionKind};
use crate::commands::bookings::ScopeFilter;
use crate::commands::financials::FinancialsArgs;
use crate::commands::runtime::{self, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    name = "ridehub",
    about = "Ridehub booking operator CLI",
    long_about = "Inspect bookings, trip financials and readiness, and drive booking actions \
                  against the Ridehub API or an offline fixture.",
    after_help = "Examples:\n  ridehub doctor --json\n  ridehub --as admin bookings\n  \
                  ridehub --as customer:7 action pay --booking 42\n  \
                  ridehub --offline bookings.json --as admin financials --monthly"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Config file (default ridehub.toml)")]
    config: Option<PathBuf>,
    #[arg(
        long = "as",
        global = true,
        value_name = "ACTOR",
        value_parser = parse_actor,
        help = "Act as admin, customer:<id> or driver:<id>"
    )]
    actor: Option<Actor>,
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Serve bookings from a JSON fixture instead of the API"
    )]
    offline: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, session readiness and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List bookings partitioned into active, completed and cancelled")]
    Bookings {
        #[arg(long, conflicts_with = "driver", help = "Admin only: one customer's bookings")]
        user: Option<i64>,
        #[arg(long, help = "Admin only: one driver's bookings")]
        driver: Option<i64>,
    },
    #[command(about = "Revenue, driver commission and net totals over paid bookings")]
    Financials {
        #[arg(long, help = "Also report one driver's earnings")]
        driver: Option<i64>,
        #[arg(long, value_parser = parse_bucket, help = "Month bucket: start_date or end_date")]
        bucket: Option<BucketField>,
        #[arg(long, help = "Break totals down by calendar month")]
        monthly: bool,
    },
    #[command(about = "Run one booking action, then re-fetch the authoritative state")]
    Action {
        #[arg(value_enum)]
        kind: ActionKind,
        #[arg(long)]
        booking: i64,
        #[arg(long, help = "Driver to assign")]
        driver: Option<i64>,
        #[arg(long, help = "Review rating 1..=5")]
        rating: Option<i64>,
        #[arg(long, help = "Review comment")]
        comment: Option<String>,
    },
}

fn parse_actor(value: &str) -> Result<Actor, String> {
    value.parse::<Actor>().map_err(|error| error.to_string())
}

fn parse_bucket(value: &str) -> Result<BucketField, String> {
    value.parse::<BucketField>().map_err(|error| error.to_string())
}

fn init_logging(logging: &LoggingConfig) {
    use ridehub_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when embedded in tests.
    let _ = match logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions { config_path: cli.config, actor: cli.actor, offline: cli.offline };

    let logging = runtime::load_config("startup", &options)
        .map(|config| config.logging)
        .unwrap_or_else(|_| ridehub_core::config::AppConfig::default().logging);
    init_logging(&logging);

    let result = match cli.command {
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
        Command::Bookings { user, driver } => {
            commands::bookings::run(&options, ScopeFilter { user, driver })
        }
        Command::Financials { driver, bucket, monthly } => {
            commands::financials::run(&options, FinancialsArgs { driver, bucket, monthly })
        }
        Command::Action { kind, booking, driver, rating, comment } => commands::action::run(
            &options,
            ActionArgs { kind, booking, driver, rating, comment },
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
