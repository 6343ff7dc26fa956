//! Logging initialization for the client.
//!
//! Everything in the workspace logs through `tracing`. Host applications
//! that already run their own subscriber keep it; `init_logging` backs
//! off when one is installed.

use tracing_subscriber::EnvFilter;

use crate::config::LOG_LEVEL_ENV;

/// Install a compact stderr subscriber for the client.
///
/// Log level comes from the `TRACKLINE_LOG_LEVEL` env var when set,
/// otherwise the provided default (trace, debug, info, warn, error).
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();

    if result.is_err() {
        // Host application already installed a subscriber; client events
        // flow into that one.
        tracing::debug!("Logging subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging("debug");
        init_logging("info");
    }
}
