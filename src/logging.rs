//! 日志初始化
//!
//! Filter precedence: `RUST_LOG`, then `-v` count, then the configured level.
//! Logs go to stderr so command output on stdout stays machine-readable.

use crate::config::LoggingConfig;
use eyre::{eyre, Result, WrapErr};
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter directive for a `-v` count, if any was given.
pub fn verbosity_directive(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn build_filter(config: &LoggingConfig, verbosity: u8) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = verbosity_directive(verbosity).unwrap_or(config.level.as_str());
    EnvFilter::try_new(directive).wrap_err_with(|| format!("Invalid log level: {}", directive))
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file on drop; keep it alive for the
/// lifetime of the process.
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<Option<WorkerGuard>> {
    let filter = build_filter(config, verbosity)?;

    let stderr_layer = if config.json {
        fmt::layer().json().with_writer(io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| eyre!("Log file path has no file name: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, None)]
    #[case(1, Some("info"))]
    #[case(2, Some("debug"))]
    #[case(3, Some("trace"))]
    #[case(9, Some("trace"))]
    fn test_verbosity_directive(#[case] verbosity: u8, #[case] expected: Option<&str>) {
        assert_eq!(verbosity_directive(verbosity), expected);
    }

    #[test]
    fn test_configured_level_parses() {
        let config = LoggingConfig {
            level: "filebucket=debug,warn".to_string(),
            ..LoggingConfig::default()
        };
        let directive = verbosity_directive(0).unwrap_or(config.level.as_str());
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
