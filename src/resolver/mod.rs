//! # Configuration Resolution
//!
//! Merges fragments, then rewrites string leaves until they settle:
//! secret references are replaced by their decrypted values and `${...}`
//! placeholders by values from the tree, the environment or their defaults.

pub mod placeholder;
mod vault;

pub use placeholder::{contains_placeholder, substitute, Placeholder};

use crate::config::ResolverSettings;
use crate::errors::{ConfigError, Result};
use crate::profiles;
use crate::tree::{merge_fragments, normalize_mapping, value_from_flat_key, ConfigValue, Fragment, LeafPath};
use layerconf_secrets::{
    EngineFactory, EngineRegistry, Environment, ProcessEnvironment, SecretReference, VaultApi,
    VaultEngine,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Resolves layered configuration against a set of secret engines.
///
/// The registry and the Vault engine registered from `secrets.vault` live
/// here, so one resolver keeps its Vault token across resolutions while
/// separate resolvers share nothing.
#[derive(Debug)]
pub struct ConfigResolver {
    registry: RwLock<EngineRegistry>,
    env: Arc<dyn Environment>,
    settings: ResolverSettings,
    vault_client: Option<Arc<dyn VaultApi>>,
    vault: Mutex<Option<VaultEngine>>,
}

impl ConfigResolver {
    pub fn new(registry: EngineRegistry, env: Arc<dyn Environment>) -> Self {
        Self {
            registry: RwLock::new(registry),
            env,
            settings: ResolverSettings::default(),
            vault_client: None,
            vault: Mutex::new(None),
        }
    }

    /// Default engines and the process environment.
    pub fn from_process_env() -> Self {
        Self::new(EngineRegistry::with_defaults(), Arc::new(ProcessEnvironment))
    }

    pub fn with_settings(mut self, settings: ResolverSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `client` instead of HTTP for the Vault engine built from
    /// `secrets.vault`.
    pub fn with_vault_client(mut self, client: Arc<dyn VaultApi>) -> Self {
        self.vault_client = Some(client);
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    pub async fn register_engine(&self, name: impl Into<String>, factory: Arc<dyn EngineFactory>) {
        self.registry.write().await.register(name, factory);
    }

    pub async fn registered_engines(&self) -> Vec<String> {
        self.registry.read().await.registered_engines()
    }

    /// Merge `fragments` (lowest precedence first) and resolve the result.
    pub async fn resolve<I>(&self, fragments: I) -> Result<ConfigValue>
    where
        I: IntoIterator<Item = Fragment>,
    {
        let tree = ConfigValue::Mapping(normalize_mapping(merge_fragments(fragments)));
        self.register_vault(&tree).await;
        self.resolve_tree(tree).await
    }

    /// Load `<name>.yml` and its profile variants from `config_dir` and
    /// resolve them. Active profiles come from the variable named by
    /// `profiles_env_var`.
    pub async fn load_properties(&self, prop_names: &[&str], config_dir: &Path) -> Result<ConfigValue> {
        let active = profiles::active_profiles(self.env.as_ref(), &self.settings.profiles_env_var);
        let names = profiles::fragment_names(prop_names, &active);
        info!(profiles = ?active, files = names.len(), "Loading configuration fragments");
        let fragments = profiles::load_fragments(config_dir, &names).await?;
        self.resolve(fragments).await
    }

    /// Resolve placeholders and secrets in an already merged tree.
    ///
    /// Runs at most one pass per top-level key and stops as soon as a pass
    /// changes nothing. Leaves are rewritten in place, so later leaves see
    /// earlier rewrites within the same pass.
    pub async fn resolve_tree(&self, mut tree: ConfigValue) -> Result<ConfigValue> {
        let max_passes = match &tree {
            ConfigValue::Mapping(entries) => entries.len(),
            ConfigValue::Sequence(items) => items.len(),
            ConfigValue::String(_) => 1,
        };
        let registry = self.registry.read().await;
        let paths = tree.leaf_paths();
        let mut decrypted: HashSet<LeafPath> = HashSet::new();

        let mut passes = 0;
        while passes < max_passes {
            passes += 1;
            let mut changed = 0usize;

            for path in &paths {
                if decrypted.contains(path) {
                    continue;
                }
                let Some(current) = tree.at(path).and_then(ConfigValue::as_str) else {
                    continue;
                };

                // a placeholder may expand to a reference; decrypt it in the same pass
                let text = if SecretReference::is_reference(current) {
                    current.to_string()
                } else {
                    substitute(current, |key| self.lookup(&tree, key))
                };
                let next = match SecretReference::detect(&text)
                    .map_err(|e| ConfigError::secret(path, e))?
                {
                    Some(reference) => {
                        debug!(path = %path, engine = %reference.engine, "Resolving secret reference");
                        decrypted.insert(path.clone());
                        registry.decrypt(&reference).await.map_err(|e| ConfigError::secret(path, e))?
                    }
                    None => text,
                };

                if let Some(slot) = tree.at_mut(path) {
                    if slot.as_str() != Some(next.as_str()) {
                        *slot = ConfigValue::String(next);
                        changed += 1;
                    }
                }
            }

            debug!(pass = passes, changed, "Placeholder pass complete");
            if changed == 0 {
                break;
            }
        }

        self.check_unresolved(&tree, &paths, &decrypted, passes)?;
        Ok(tree)
    }

    /// Tree value first, then the environment variable of the same name.
    fn lookup(&self, tree: &ConfigValue, key: &str) -> Option<String> {
        value_from_flat_key(tree, key)
            .ok()
            .map(str::to_string)
            .or_else(|| self.env.var(key))
    }

    fn check_unresolved(
        &self,
        tree: &ConfigValue,
        paths: &[LeafPath],
        decrypted: &HashSet<LeafPath>,
        passes: usize,
    ) -> Result<()> {
        let unresolved: Vec<String> = paths
            .iter()
            .filter(|path| !decrypted.contains(*path))
            .filter(|path| tree.at(path).and_then(ConfigValue::as_str).is_some_and(contains_placeholder))
            .map(ToString::to_string)
            .collect();

        if unresolved.is_empty() {
            return Ok(());
        }
        if self.settings.strict_placeholders {
            return Err(ConfigError::UnresolvedPlaceholders { paths: unresolved, passes });
        }
        warn!(passes, paths = ?unresolved, "Placeholders left unresolved");
        Ok(())
    }
}
