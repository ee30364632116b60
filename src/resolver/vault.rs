//! Registers the `vault` engine described by the `secrets.vault` section.

use super::{substitute, ConfigResolver};
use crate::errors::{ConfigError, Result};
use crate::tree::ConfigValue;
use layerconf_secrets::vault::VaultConfig;
use layerconf_secrets::{EngineKind, VaultEngine};
use std::sync::Arc;
use tracing::{debug, info, warn};

const VAULT_SECTION: &str = "secrets.vault";

impl ConfigResolver {
    /// Build and register a Vault engine from `secrets.vault`.
    ///
    /// When the section is missing, disabled or unusable, an engine this
    /// resolver registered earlier is removed, so references to `vault` fail
    /// as an unknown engine. An engine already registered with the same
    /// config is kept, along with its cached token. Returns whether a new
    /// engine was registered.
    pub(crate) async fn register_vault(&self, tree: &ConfigValue) -> bool {
        let mut current = self.vault.lock().await;

        let built = match self.vault_config(tree) {
            Ok(None) => None,
            Ok(Some(config)) => {
                if current.as_ref().is_some_and(|engine| engine.config() == &config) {
                    debug!("Vault configuration unchanged, keeping registered engine");
                    return false;
                }
                let options = self.settings.vault_options();
                let built = match &self.vault_client {
                    Some(client) => VaultEngine::with_client(
                        config,
                        Arc::clone(&self.env),
                        Arc::clone(client),
                        &options,
                    ),
                    None => VaultEngine::connect(config, Arc::clone(&self.env), &options),
                };
                match built {
                    Ok(engine) => Some(engine),
                    Err(e) => {
                        let error = ConfigError::vault_config(e.to_string());
                        warn!(error = %error, "Vault secret engine unavailable");
                        None
                    }
                }
            }
            Err(error) => {
                warn!(error = %error, "Vault secret engine unavailable");
                None
            }
        };

        let mut registry = self.registry.write().await;
        match built {
            Some(engine) => {
                registry.register(EngineKind::Vault.as_str(), Arc::new(engine.clone()));
                info!(url = %engine.config().url, "Vault secret engine registered from configuration");
                *current = Some(engine);
                true
            }
            None => {
                if current.take().is_some() {
                    registry.unregister(EngineKind::Vault.as_str());
                    info!("Vault secret engine unregistered");
                }
                false
            }
        }
    }

    /// The usable config in `secrets.vault` with placeholders filled in.
    /// `Ok(None)` when the section is absent, empty or disabled.
    fn vault_config(&self, tree: &ConfigValue) -> Result<Option<VaultConfig>> {
        let Some(mut section) = tree
            .get(VAULT_SECTION)
            .filter(|s| s.as_mapping().is_some_and(|m| !m.is_empty()))
            .cloned()
        else {
            debug!("No secrets.vault section, skipping Vault engine");
            return Ok(None);
        };

        for path in section.leaf_paths() {
            let Some(text) = section.at(&path).and_then(ConfigValue::as_str) else {
                continue;
            };
            let resolved = substitute(text, |key| self.lookup(tree, key));
            if let Some(slot) = section.at_mut(&path) {
                *slot = ConfigValue::String(resolved);
            }
        }

        let config: VaultConfig = section.deserialize_into().map_err(|e| {
            ConfigError::vault_config(format!("could not decode {}: {}", VAULT_SECTION, e))
        })?;
        if config == VaultConfig::default() {
            debug!("Empty secrets.vault section, skipping Vault engine");
            return Ok(None);
        }
        if !config.enabled {
            debug!("Vault secret engine disabled");
            return Ok(None);
        }
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::parse_fragment;
    use crate::tree::Value;
    use async_trait::async_trait;
    use layerconf_secrets::vault::{VaultApi, VaultApiError, VaultAuth, VaultResponse};
    use layerconf_secrets::{EngineRegistry, SecretString, SecretsError};
    use serde_json::{json, Value as Json};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts any USERPASS login and serves `secret/app`.
    #[derive(Debug, Default)]
    struct FakeVault {
        logins: AtomicUsize,
    }

    #[async_trait]
    impl VaultApi for FakeVault {
        async fn read(
            &self,
            path: &str,
            _token: Option<&SecretString>,
        ) -> std::result::Result<Option<VaultResponse>, VaultApiError> {
            if path != "secret/app" {
                return Ok(None);
            }
            let data = json!({ "password": "s3cr3t" });
            Ok(Some(VaultResponse { data: data.as_object().cloned(), ..Default::default() }))
        }

        async fn write(
            &self,
            _path: &str,
            _token: Option<&SecretString>,
            _body: Json,
        ) -> std::result::Result<Option<VaultResponse>, VaultApiError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(Some(VaultResponse {
                auth: Some(VaultAuth { client_token: SecretString::new("s.fake") }),
                ..Default::default()
            }))
        }
    }

    const VAULT_YAML: &str = "\
secrets:
  vault:
    enabled: true
    url: http://vault:8200
    authMethod: USERPASS
    username: ${vault.user}
    password: ${VAULT_PW:pw}
    userAuthPath: userpass
vault:
  user: svc
db:
  password: encrypted:vault!e:secret!p:app!k:password
";

    fn resolver(api: Arc<FakeVault>) -> ConfigResolver {
        ConfigResolver::new(EngineRegistry::with_defaults(), Arc::new(HashMap::<String, String>::new()))
            .with_vault_client(api)
    }

    fn tree(yaml: &str) -> ConfigValue {
        Value::Mapping(parse_fragment(yaml).unwrap()).normalize()
    }

    #[tokio::test]
    async fn test_section_registers_engine_with_placeholders() {
        let api = Arc::new(FakeVault::default());
        let resolver = resolver(Arc::clone(&api));

        let resolved = resolver.resolve(vec![parse_fragment(VAULT_YAML).unwrap()]).await.unwrap();
        assert_eq!(resolved.get_str("db.password"), Some("s3cr3t"));

        let current = resolver.vault.lock().await;
        let config = current.as_ref().unwrap().config();
        assert_eq!(config.username, "svc");
        assert_eq!(config.password.expose_secret(), "pw");
    }

    #[tokio::test]
    async fn test_unchanged_config_keeps_engine_and_token() {
        let api = Arc::new(FakeVault::default());
        let resolver = resolver(Arc::clone(&api));

        resolver.resolve(vec![parse_fragment(VAULT_YAML).unwrap()]).await.unwrap();
        resolver.resolve(vec![parse_fragment(VAULT_YAML).unwrap()]).await.unwrap();
        assert_eq!(api.logins.load(Ordering::SeqCst), 1);
        assert!(!resolver.register_vault(&tree(VAULT_YAML)).await);
    }

    #[tokio::test]
    async fn test_invalid_section_is_skipped() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        let yaml = "secrets: {vault: {enabled: true, url: 'http://vault', authMethod: KUBERNETES}}\n";
        assert!(!resolver.register_vault(&tree(yaml)).await);
        assert!(!resolver.registered_engines().await.contains(&"vault".to_string()));
    }

    #[tokio::test]
    async fn test_disabled_or_missing_section() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        assert!(!resolver.register_vault(&tree("secrets: {vault: {enabled: 'false'}}\n")).await);
        assert!(!resolver.register_vault(&tree("other: 1\n")).await);
        assert!(!resolver.register_vault(&tree("secrets: {vault: {}}\n")).await);
        assert_eq!(resolver.registered_engines().await, vec!["noop"]);
    }

    #[tokio::test]
    async fn test_disabling_section_unregisters_engine() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        resolver.resolve(vec![parse_fragment(VAULT_YAML).unwrap()]).await.unwrap();

        let disabled = "secrets: {vault: {enabled: false}}\ndb: {pw: 'encrypted:vault!e:secret!p:app!k:password'}\n";
        let err = resolver.resolve(vec![parse_fragment(disabled).unwrap()]).await.unwrap_err();
        assert!(matches!(
            err.secret_source(),
            Some(SecretsError::UnknownEngine { engine }) if engine == "vault"
        ));
        assert!(resolver.vault.lock().await.is_none());
        assert_eq!(resolver.registered_engines().await, vec!["noop"]);
    }

    #[tokio::test]
    async fn test_invalid_section_after_valid_unregisters_engine() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        assert!(resolver.register_vault(&tree(VAULT_YAML)).await);

        let invalid = "secrets: {vault: {enabled: true, url: 'http://vault', authMethod: KUBERNETES}}\n";
        assert!(!resolver.register_vault(&tree(invalid)).await);
        assert!(!resolver.registered_engines().await.contains(&"vault".to_string()));
    }

    #[tokio::test]
    async fn test_removed_section_unregisters_engine() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        assert!(resolver.register_vault(&tree(VAULT_YAML)).await);
        assert!(!resolver.register_vault(&tree("other: 1\n")).await);
        assert_eq!(resolver.registered_engines().await, vec!["noop"]);
    }

    #[tokio::test]
    async fn test_manually_registered_engine_survives_missing_section() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        resolver.register_engine("vault", Arc::new(layerconf_secrets::NoopEngine)).await;
        assert!(!resolver.register_vault(&tree("other: 1\n")).await);
        assert!(resolver.registered_engines().await.contains(&"vault".to_string()));
    }

    #[test]
    fn test_undecodable_section_is_vault_config_error() {
        let resolver = resolver(Arc::new(FakeVault::default()));
        let section = tree("secrets: {vault: {enabled: true, url: [a, b]}}\n");
        assert!(matches!(resolver.vault_config(&section), Err(ConfigError::VaultConfig { .. })));
    }
}
