//! Logging setup.
//!
//! Diagnostics go through `tracing` to stderr, and additionally to a daily
//! rolling file when a log directory is configured. The per-image and
//! per-cluster listing meant for the user is printed to stdout by the
//! pipeline itself and is not affected by the log level.

use anyhow::Result;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the logging system.
///
/// Log level can be controlled via the `TROMBI_LOG` environment variable:
/// - `TROMBI_LOG=debug` for verbose output
/// - `TROMBI_LOG=info` for per-step progress
/// - `TROMBI_LOG=warn` for warnings and errors only (default)
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("TROMBI_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .try_init()?;
        return Ok(());
    };

    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "trombi.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard would stop the background writer
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}
