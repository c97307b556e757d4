use anyhow::{Context, Result};
use clap::Parser;
use job_engine::app_log;
use job_engine::cli::{handle_command, Cli};
use job_engine::config::EngineConfig;
use job_engine::session::cancel_pair;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref())?;

    // Initialize logging once the log path is known
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true) // Clear file on startup
        .open(&config.log_path)
        .with_context(|| format!("Failed to open log file {}", config.log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_current_span(false)
                .with_span_list(false),
        )
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    app_log!(info, "Log file: {}", config.log_path.display());
    app_log!(info, "Export path: {}", config.export_path.display());

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            app_log!(warn, "Interrupt received, stopping the session");
            handle.cancel();
        }
    });

    handle_command(cli, config, signal).await
}
