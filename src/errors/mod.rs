//! # Error Handling
//!
//! Error types for configuration resolution, built with `thiserror`.

pub mod types;

pub use types::{ConfigError, Result};
