//! Tracing setup. Logs go to stderr so stdout only carries command output.

use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;

pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::WARN;

/// Parse a level name (`off`, `error`, `warn`, `info`, `debug`, `trace`).
/// Unknown names fall back to [`DEFAULT_LOG_LEVEL`].
pub fn parse_level(level: &str) -> LevelFilter {
    let level = level.trim();
    if level.is_empty() {
        return DEFAULT_LOG_LEVEL;
    }
    LevelFilter::from_str(level).unwrap_or(DEFAULT_LOG_LEVEL)
}

/// Install the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes buffered log lines.
pub fn init(level: &str) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let installed = tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_writer(writer)
        .with_target(false)
        .without_time()
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    guard
}
