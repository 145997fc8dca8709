//! Tracing setup for the `remedy` binary.
//!
//! Console output goes to stderr (text or JSON). When `.remedy/logs/` exists
//! a daily-rolling JSON log is written there as well.

use clap::ValueEnum;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_FILE_PREFIX: &str = "remedy.log";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `RUST_LOG` wins; otherwise the given default directive.
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Console level when `RUST_LOG` is unset. Progress bars share stderr, so
/// only warnings show unless `--verbose`.
pub fn console_directive(verbose: bool) -> &'static str {
    if verbose { "remedy=debug" } else { "remedy=warn" }
}

/// Install the global subscriber. Keep the returned guard alive for the
/// whole process or buffered file output is lost.
pub fn init_tracing(format: LogFormat, verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let text = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter(console_directive(verbose)))
    });
    let json = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter(console_directive(verbose)))
    });

    let (file, guard) = match log_dir.filter(|dir| dir.is_dir()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(env_filter("remedy=info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be installed (tests); that is not an error.
    let _ = tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(file)
        .try_init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_directive_follows_verbosity() {
        assert_eq!(console_directive(true), "remedy=debug");
        assert_eq!(console_directive(false), "remedy=warn");
    }

    #[test]
    fn test_missing_log_dir_gives_no_guard() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_tracing(LogFormat::Text, false, Some(&dir.path().join("absent")));
        assert!(guard.is_none());
    }
}
