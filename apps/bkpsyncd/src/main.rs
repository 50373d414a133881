//! bkpsync upload daemon entry point.

mod app;
mod config;
mod logging;

use std::path::PathBuf;

use clap::Parser;

/// Receives resumable chunked uploads over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "bkpsyncd", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration first: it decides where logs go.
    let config = config::Config::load(args.config.as_deref())?;

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = logging::init(&config.log)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting bkpsync daemon"
    );
    tracing::info!(
        upload_root = %config.upload_root.display(),
        port = config.port,
        "configuration loaded"
    );

    // Build and run the tokio runtime.
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("daemon shut down cleanly");
    Ok(())
}
