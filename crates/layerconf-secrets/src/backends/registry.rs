//! Engine registry
//!
//! Maps engine names to the factories that build decrypters for them.

use super::backend::{Decrypter, EngineFactory, EngineKind};
use super::noop::NoopEngine;
use crate::error::{Result, SecretsError};
use crate::reference::SecretReference;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of secret engines keyed by the name used in references.
///
/// Unknown names are a permanent error. The registry is mutated only while
/// configuring; resolution reads it.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn EngineFactory>>,
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").field("engines", &self.registered_engines()).finish()
    }
}

impl EngineRegistry {
    /// Create a registry with no engines
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the always-available `noop` engine
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EngineKind::Noop.as_str(), Arc::new(NoopEngine));
        registry
    }

    /// Register (or replace) an engine under `name`
    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn EngineFactory>) {
        let name = name.into();
        info!(engine = %name, "Registering secret engine");
        self.engines.insert(name, factory);
    }

    /// Remove an engine, returning whether it was present
    pub fn unregister(&mut self, name: &str) -> bool {
        self.engines.remove(name).is_some()
    }

    /// Check if an engine is registered
    pub fn has_engine(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Sorted list of registered engine names
    pub fn registered_engines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the decrypter for a reference without fetching anything
    pub fn decrypter_for(&self, reference: &SecretReference) -> Result<Box<dyn Decrypter>> {
        let factory = self
            .engines
            .get(&reference.engine)
            .ok_or_else(|| SecretsError::unknown_engine(&reference.engine))?;
        factory.build(reference.is_file, &reference.params)
    }

    /// Build and run the decrypter for a reference
    pub async fn decrypt(&self, reference: &SecretReference) -> Result<String> {
        let decrypter = self.decrypter_for(reference)?;
        debug!(engine = %reference.engine, is_file = reference.is_file, "Decrypting secret reference");
        decrypter.decrypt().await
    }
}
