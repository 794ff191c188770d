//! Replicate one hotel's searches, quotes and price history between two
//! environments. Prints the sync report as JSON on stdout.

use clap::Parser;
use rate_scout::db;
use rate_scout::services::sync::SyncMapper;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rate-sync")]
#[command(about = "Full-replace sync of a hotel's price data between databases")]
struct Cli {
    /// Database to copy from
    #[arg(long, env = "SYNC_SOURCE_DATABASE_URL")]
    source_url: String,

    /// Database to replace into
    #[arg(long, env = "SYNC_DEST_DATABASE_URL")]
    dest_url: String,

    /// Hotel id in the source database
    #[arg(long)]
    hotel_id: i64,

    /// Hotel id in the destination database (defaults to --hotel-id)
    #[arg(long)]
    dest_hotel_id: Option<i64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dest_hotel_id = cli.dest_hotel_id.unwrap_or(cli.hotel_id);

    let source = match db::init_pool(&cli.source_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to source database");
            return ExitCode::FAILURE;
        }
    };
    let destination = match db::init_pool(&cli.dest_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to destination database");
            return ExitCode::FAILURE;
        }
    };

    let mapper = SyncMapper::new(source, destination);
    match mapper.run(cli.hotel_id, dest_hotel_id).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize sync report");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(hotel_id = cli.hotel_id, error = %e, "Sync failed");
            ExitCode::FAILURE
        }
    }
}
