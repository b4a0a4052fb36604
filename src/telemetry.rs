//! Console tracing setup shared by the CLI and tests.

use tracing::Level;

use crate::config::LogLevel;

/// Installs the global fmt subscriber. An explicit `RUST_LOG` wins over the
/// configured level.
pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("tally={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
