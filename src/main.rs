//! case-solver binary

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use case_solver::cli::Cli;

/// Used when RUST_LOG is unset; lapin is chatty at info
const DEFAULT_LOG_FILTER: &str = "info,lapin=warn";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting case-solver");

    Cli::parse().execute().await
}
