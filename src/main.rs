//! podcatalog - Browse a podcast catalog through an offline-capable cache
//!
//! Prints the requested catalog data as JSON. Logging goes to stderr and is
//! controlled with `RUST_LOG` (default `warn`).

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use podcatalog::app::App;
use podcatalog::cli::Cli;
use podcatalog::config::Config;

/// Installs the stderr log subscriber
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.apply(Config::from_env())?;
    let app = App::build(&config).await?;

    match app.run(&cli.command).await {
        Some(json) => {
            println!("{}", serde_json::to_string_pretty(&json)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No data available");
            Ok(ExitCode::FAILURE)
        }
    }
}
