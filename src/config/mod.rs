//! # Configuration
//!
//! Settings that steer resolution, as opposed to the configuration being
//! resolved.

pub mod settings;

pub use settings::{LoggingConfig, ResolverSettings, DEFAULT_PROFILES_ENV_VAR};
