use clap::Parser;
use gymhost_lib::config::{Cli, ServerConfig};

/// Command-line entry point for the gym server
///
/// This is a thin wrapper that delegates to the library crate:
/// it parses flags, sets up logging and hands the merged config to `run`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .init();

    let config = ServerConfig::from_cli(&cli)?;
    log::debug!("Starting with {:?}", config);
    gymhost_lib::run(config).await
}
