use anyhow::Context;
use clap::Parser;
use studioctl::{
    commands,
    config::{Args, Config},
};
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI args
    let args = Args::parse();
    debug!("{:?}", args);

    // Load configuration
    let config = Config::load(&args).context("Failed to load configuration")?;
    debug!("Running with configuration: {:#?}", config);

    commands::run(args.command, &config).await?;
    Ok(())
}
