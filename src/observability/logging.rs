//! # Structured Logging
//!
//! Subscriber setup for binaries and tests that embed the resolver.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over the configured level. Returns `false` when a global
/// subscriber was already installed, which is not an error.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json_logging {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(
            log_level = %config.log_level,
            json = config.json_logging,
            "Logging initialized"
        );
    }
    installed
}
