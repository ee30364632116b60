//! Environment variable lookup.
//!
//! Placeholder fallback and Vault's `VAULT_TOKEN` both read the process
//! environment. Going through [`Environment`] lets tests and embedders supply
//! a fixed map instead of mutating global process state.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

/// Source of environment variables.
pub trait Environment: Send + Sync + Debug {
    /// Value of `name`, or `None` when unset or not valid unicode.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl Environment for BTreeMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}
