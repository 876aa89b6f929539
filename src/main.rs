//! devmon — local development environment monitor.
//!
//! A TUI that watches the services a developer runs locally (Docker,
//! PostgreSQL, MySQL, Redis, Node.js, Python, listening ports, host
//! resources), keeps a rolling metrics history in an embedded store, and can
//! stream remediation suggestions from a locally hosted LLM, gating any
//! proposed command behind explicit confirmation.

mod config;
mod core;
mod llm;
mod logger;
mod probes;
mod store;
mod ui;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::app::App;
use crate::core::events::EventHandler;
use crate::store::MetricsStore;

#[derive(Parser)]
#[command(name = "devmon")]
#[command(version = "0.1.0")]
#[command(about = "Local development environment monitor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the LLM server endpoint
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
}

fn setup_logging(verbosity: u8) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let log_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".devmon")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "devmon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging_guard = match setup_logging(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(_) => None, // diagnostics are optional; the dashboard is not
    };

    let mut config = match &cli.config {
        Some(path) => match config::Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {e:#}", path.display());
                std::process::exit(1);
            }
        },
        None => config::Config::load_default(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.llm.endpoint = endpoint;
    }

    let store = match MetricsStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error initializing database: {e:#}");
            std::process::exit(1);
        }
    };

    let retention = Duration::from_secs(config.general.retention_hours * 3600);

    // Startup safety net, off the hot path.
    {
        let store = store.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.cleanup_old_data(retention) {
                tracing::warn!(error = %e, "startup cleanup failed");
            }
        });
    }

    // Hourly archival of rows past the retention window.
    let archive_task = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            ticker.tick().await; // immediate first pass
            loop {
                let store = store.clone();
                let result = tokio::task::spawn_blocking(move || {
                    store.archive_old_data(retention)
                })
                .await;
                match result {
                    Ok(Ok(Some(path))) => {
                        tracing::info!(path = %path.display(), "metrics archived")
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => {
                        logger::log_issue("DB_ARCHIVE_ERROR", &e.to_string());
                    }
                    Err(e) => tracing::warn!(error = %e, "archive task panicked"),
                }
                ticker.tick().await;
            }
        })
    };

    let writer_tx = store::writer::spawn(store.clone());

    let (mut events, tx) = EventHandler::new();
    EventHandler::spawn_sources(tx.clone());

    let mut app = match App::new(&config, Some(store), writer_tx, tx) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error initializing terminal: {e:#}");
            std::process::exit(1);
        }
    };

    let result = app.run(&mut events).await;
    archive_task.abort();

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
