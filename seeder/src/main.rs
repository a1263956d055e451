use api::seed::{self, EnsureOutcome, DEFAULT_MONTHS, DEFAULT_PER_DAY};
use api::store::RestStore;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Batch maintenance jobs for the telemetry store.
#[derive(Parser)]
#[command(name = "seeder")]
struct Cli {
    /// Base URL of the remote store's REST endpoint
    #[arg(long, env = "STORE_URL", default_value = "http://localhost:3000")]
    store_url: String,

    /// API key used for bearer authentication against the store
    #[arg(long, env = "STORE_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "STORE_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed synthetic telemetry for the last N months up to today (UTC)
    Seed {
        /// Months to seed, counted back from today as 30-day blocks
        #[arg(long, default_value_t = DEFAULT_MONTHS)]
        months: u32,

        /// Records per day
        #[arg(long = "per-day", default_value_t = DEFAULT_PER_DAY)]
        per_day: u32,
    },
    /// Ensure at least one record exists for the current UTC day
    EnsureToday,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    let store = match RestStore::new(
        &cli.store_url,
        &cli.api_key,
        Duration::from_secs(cli.timeout_secs),
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to build store client: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Seed { months, per_day } => match seed::seed(store, months, per_day).await {
            Ok(report) => {
                info!(
                    "Seeding complete: {}/{} record(s) inserted, {} failed chunk(s)",
                    report.inserted, report.attempted, report.failed_chunks
                );
                if report.inserted == 0 && report.attempted > 0 {
                    error!("No chunk could be inserted");
                    std::process::exit(1);
                }
                if report.inserted < report.attempted {
                    warn!(
                        "Partial seeding: {} record(s) were not inserted",
                        report.attempted - report.inserted
                    );
                }
            }
            Err(e) => {
                error!("Seeding failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::EnsureToday => match seed::ensure_today(store).await {
            Ok(EnsureOutcome::AlreadyPresent) => {
                info!("A record for today (UTC) already exists. Nothing to do.");
            }
            Ok(EnsureOutcome::Inserted) => {
                info!("Inserted record for today.");
            }
            Err(e) => {
                error!("ensure-today failed: {}", e);
                std::process::exit(1);
            }
        },
    }
}
