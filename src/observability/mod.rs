//! # Observability
//!
//! Logging setup. Resolution itself only emits `tracing` events.

pub mod logging;

pub use logging::init_logging;
