//! Tracing setup for the CLI.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! binary's job. Output goes to stderr so stdout stays clean for command
//! results. With `logging.directory` set, a second JSON layer writes
//! daily-rolling files through a non-blocking appender.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, SteerConfig};

/// `RUST_LOG` when set, else `level`, else `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file appender on drop; hold it for the
/// life of the process.
pub fn init(config: &SteerConfig) -> Result<Option<WorkerGuard>> {
    init_with(
        &config.log_level(),
        config.toml.logging.format,
        config.log_dir().as_deref(),
    )
}

pub fn init_with(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(match format {
        LogFormat::Compact => stderr.compact().boxed(),
        LogFormat::Json => stderr.json().boxed(),
    });

    let guard = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "autosteer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .json()
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(level))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_directives() {
        // Falls back rather than failing on junk.
        let filter = build_filter("autosteer=loud");
        assert!(!filter.to_string().is_empty());
        let filter = build_filter("autosteer=debug");
        assert!(!filter.to_string().is_empty());
    }
}
