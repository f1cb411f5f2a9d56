use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Base name of the rotated log files.
const LOG_FILE_PREFIX: &str = "placement.log";

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mesh-placement")
        .join("logs")
}

/// `RUST_LOG` overrides the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Daily-rotated file layer plus a human-readable stdout layer.
///
/// Built separately from installation so callers can scope it
/// (`tracing::subscriber::with_default`) instead of claiming the global
/// default.
fn production_subscriber(
    level: &str,
    log_dir: &Path,
) -> impl tracing::Subscriber + Send + Sync {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_line_number(false),
        )
}

/// Install logging for a long-running host process: daily-rotated files
/// under `log_dir` (default `~/.mesh-placement/logs`) plus stdout.
pub fn init_production_logging(level: &str, log_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    production_subscriber(level, &log_dir)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    tracing::info!(log_dir = %log_dir.display(), level, "Logging initialized");
    Ok(())
}

/// Stdout-only logging for tests and short-lived tools.
///
/// Safe to call repeatedly; only the first call in a process installs
/// the subscriber.
pub fn init_simple_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_line_number(false),
        )
        .try_init();
}
