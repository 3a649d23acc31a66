//! Smooth Sailing CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use sailing_cli::cli::Cli;
use sailing_cli::commands;

#[tokio::main]
async fn main() {
    // Load .env if it exists (for SAILING_KUBECTL etc.)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));

    fmt().with_env_filter(filter).with_target(false).init();

    let tools = cli.tool_config();
    if let Err(e) = commands::execute(cli.command, tools).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
