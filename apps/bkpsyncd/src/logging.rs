//! Logging setup.
//!
//! `RUST_LOG` overrides the configured level. File output rotates daily,
//! goes through a non-blocking writer whose guard must live as long as the
//! process, and is mirrored to stdout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILE: &str = "logs/bkpsyncd.log";

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    #[default]
    Stdout,
    File,
}

/// `[log]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or `bkpsync_transfer=debug`.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub target: LogTarget,

    /// Log file path when `target = "file"`. The date is appended to each
    /// day's file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Emit JSON lines instead of text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            target: LogTarget::default(),
            file: None,
            json: false,
        }
    }
}

impl LogConfig {
    /// Log file path, or the default one.
    pub fn file_path(&self) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }
}

/// Installs the global subscriber. Should only be called once.
///
/// Returns the file writer's guard when logging to a file; dropping it
/// flushes and stops the writer thread.
pub fn init(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    match config.target {
        LogTarget::Stdout => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter);
            let installed = if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            };
            installed.map_err(|e| anyhow::anyhow!(e))?;
            Ok(None)
        }
        LogTarget::File => {
            let path = config.file_path();
            let (dir, name) = split_log_path(&path);
            std::fs::create_dir_all(&dir)?;

            let (writer, guard) = tracing_appender::non_blocking(daily_appender(&dir, &name));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = if config.json {
                let console = tracing_subscriber::fmt::layer();
                let file = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                registry.with(console.json()).with(file.json()).try_init()
            } else {
                let console = tracing_subscriber::fmt::layer();
                let file = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                registry.with(console).with(file).try_init()
            };
            installed.map_err(|e| anyhow::anyhow!(e))?;
            Ok(Some(guard))
        }
    }
}

/// File appender starting a new `<name>.<YYYY-MM-DD>` file every day.
fn daily_appender(dir: &Path, name: &Path) -> RollingFileAppender {
    rolling::daily(dir, name)
}

/// Splits a log file path into its directory and file name.
fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("bkpsyncd.log"));
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, name)
}
