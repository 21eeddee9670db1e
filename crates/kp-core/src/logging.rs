//! Logging bootstrap
//!
//! Library code only emits `tracing` events; binaries call [`init`] once.

use tracing_subscriber::EnvFilter;

use crate::config::DebugConfig;

/// Build the filter for a debug configuration. `RUST_LOG` takes precedence.
pub fn env_filter(debug: &DebugConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(debug.log_level.as_directive()))
}

/// Install the global fmt subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(debug: &DebugConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .try_init()
        .is_ok()
}
