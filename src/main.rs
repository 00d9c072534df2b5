//! Miharu command line entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use miharu::{api, Config};

#[derive(Debug, Parser)]
#[command(name = "miharu", version, about = "OpenAI API usage telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the usage dashboard
    Dashboard {
        /// Port to listen on (overrides MIHARU_DASHBOARD_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Database file (overrides MIHARU_DB_PATH)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("miharu=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Dashboard { port, db } => {
            let mut config = Config::from_env();
            if let Some(port) = port {
                config = config.with_dashboard_port(port);
            }
            if let Some(db) = db {
                config = config.with_db_path(db);
            }
            api::serve(config).await
        }
    }
}
