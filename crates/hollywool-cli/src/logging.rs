//! Subscriber setup: stderr always, plus a daily log file when configured.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use hollywool_core::config::HollywoolConfig;
use hollywool_infrastructure::HollywoolPaths;

const DEFAULT_FILTER: &str = "info";

/// `RUST_LOG` wins over the configured filter; `info` otherwise.
fn env_filter(config: &HollywoolConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = config.log_filter.as_deref().unwrap_or(DEFAULT_FILTER);
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(config: &HollywoolConfig, paths: &HollywoolPaths) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if !config.log_to_file {
        tracing_subscriber::registry()
            .with(env_filter(config))
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let logs_dir = paths.logs_dir()?;
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;
    let appender = tracing_appender::rolling::daily(&logs_dir, "hollywool.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(stderr_layer)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    tracing::debug!("[Logging] Writing logs to {}", logs_dir.display());
    Ok(Some(guard))
}
