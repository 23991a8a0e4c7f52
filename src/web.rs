#![cfg(not(tarpaulin_include))]

use clap::Parser;
use leadsheet::app;
use leadsheet::config::Config;

/// Main entry point for the lead import server
///
/// Reads configuration from flags and `LEADSHEET_*` environment variables,
/// then serves the HTTP API until the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("starting with {:?}", config);

    app::run(config).await
}
