//! Tracing subscriber setup for hosts embedding the library.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a fmt subscriber filtered by `config.level`.
///
/// An unparsable level falls back to `info`. Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(&config.level))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .try_init()
        .is_ok()
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
