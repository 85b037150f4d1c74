//! Tracing subscriber setup.
//!
//! Logs go to stderr so that command output on stdout stays
//! machine-readable. `RUST_LOG`, when set, wins over the configured level.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{TrashcamError, TrashcamResult};

/// Install the global subscriber, failing on a bad level directive or when
/// a subscriber is already installed.
pub fn try_init_logging(config: &LoggingConfig) -> TrashcamResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.level)?,
    };
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.with_target);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| TrashcamError::config(format!("cannot install logger: {e}")))
}

/// Route debug logs through the test harness's output capture. Safe to
/// call from every test.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Parse a configured level such as `info` or `warn,trashcam_workflow=debug`.
pub fn level_filter(level: &str) -> TrashcamResult<EnvFilter> {
    EnvFilter::try_new(level)
        .map_err(|e| TrashcamError::config(format!("invalid log level '{level}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directives_parse() {
        assert!(level_filter("info").is_ok());
        assert!(level_filter("warn,trashcam_workflow=debug").is_ok());
    }
}
