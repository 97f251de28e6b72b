//! Command-line interface for case-solver.
//!
//! Provides commands for serving the HTTP API, consuming broker events,
//! solving a single case from the terminal and inspecting configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use crate::adapters::CaseAssignedConsumer;
use crate::app::{build_handler, build_pipeline};
use crate::config::Settings;
use crate::domain::{validate_requested_count, CaseQuery};
use crate::server::{self, AppState};

/// case-solver - Retrieval-augmented solution suggestions for support cases
#[derive(Parser, Debug)]
#[command(name = "case-solver")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to .case-solver/config.yaml discovery)
    #[arg(short, long, global = true, env = "CASE_SOLVER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Consume CaseAssigned events from the broker
    Consume,

    /// Serve the HTTP API and consume events in one process
    Run {
        /// Address to bind to (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Solve a single case and print the suggestions
    Solve {
        /// Case description
        text: String,

        /// Number of context documents to retrieve
        #[arg(short, long, default_value = "5")]
        k: u32,

        /// Number of suggestions (defaults to k)
        #[arg(short, long)]
        n: Option<u32>,

        /// Specialization used to narrow retrieval
        #[arg(long)]
        speciality: Option<String>,

        /// Consultant the case belongs to
        #[arg(long)]
        consultant: Option<String>,
    },

    /// Show resolved configuration (secrets redacted)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(self.config.as_deref())?;

        match self.command {
            Commands::Serve { bind } => serve(settings, bind).await,
            Commands::Consume => consume(settings).await,
            Commands::Run { bind } => run_all(settings, bind).await,
            Commands::Solve {
                text,
                k,
                n,
                speciality,
                consultant,
            } => solve(settings, text, k, n, speciality, consultant).await,
            Commands::Config => show_config(&settings),
        }
    }
}

/// Resolves once Ctrl-C (or SIGTERM on unix) is received
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Serve the HTTP API
async fn serve(settings: Settings, bind: Option<String>) -> Result<()> {
    let address = bind.unwrap_or_else(|| settings.server.bind.clone());
    let pipeline = Arc::new(build_pipeline(&settings)?);

    server::serve(&address, AppState::new(pipeline), shutdown_signal()).await
}

/// Consume CaseAssigned events
async fn consume(settings: Settings) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&settings)?);
    let handler = Arc::new(build_handler(&settings, pipeline).await?);
    let consumer = CaseAssignedConsumer::connect(&settings.amqp).await?;

    consumer.run(handler, shutdown_signal()).await
}

/// HTTP and consumer sharing one pipeline and one shutdown signal.
///
/// When either side stops, the other is asked to stop too and is awaited,
/// so the consumer always drains its in-flight deliveries.
async fn run_all(settings: Settings, bind: Option<String>) -> Result<()> {
    let address = bind.unwrap_or_else(|| settings.server.bind.clone());
    let pipeline = Arc::new(build_pipeline(&settings)?);
    let handler = Arc::new(build_handler(&settings, Arc::clone(&pipeline)).await?);
    let consumer = CaseAssignedConsumer::connect(&settings.amqp).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let signal_tx = Arc::clone(&stop_tx);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let stopped = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let http = async {
        let result =
            server::serve(&address, AppState::new(pipeline), stopped(stop_rx.clone())).await;
        let _ = stop_tx.send(true);
        result
    };
    let events = async {
        let result = consumer.run(handler, stopped(stop_rx.clone())).await;
        let _ = stop_tx.send(true);
        result
    };

    let (served, consumed) = tokio::join!(http, events);
    served.and(consumed)
}

/// Solve one case and print the suggestions, one per line
async fn solve(
    settings: Settings,
    text: String,
    k: u32,
    n: Option<u32>,
    speciality: Option<String>,
    consultant: Option<String>,
) -> Result<()> {
    let mut query = CaseQuery::new(text, k);
    query.speciality = speciality;
    query.consultant_id = consultant;

    query.validate()?;
    validate_requested_count(n)?;

    let pipeline = build_pipeline(&settings)?;
    let result = pipeline
        .solve(&query, n)
        .await
        .context("Failed to solve case")?;

    for (i, suggestion) in result.suggestions.iter().enumerate() {
        println!("{}. {}", i + 1, suggestion.text);
    }

    Ok(())
}

/// Print the resolved configuration
fn show_config(settings: &Settings) -> Result<()> {
    match &settings.source {
        Some(path) => println!("# Config file: {}", path.display()),
        None => println!("# Config file: (none, using defaults and environment)"),
    }

    let yaml = serde_yaml::to_string(&settings.redacted()).context("Failed to render settings")?;
    print!("{}", yaml);

    Ok(())
}
