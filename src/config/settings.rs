//! # Resolver Settings
//!
//! Knobs for resolution itself, loaded from defaults and `LAYERCONF_*`
//! environment variables.

use crate::errors::{ConfigError, Result};
use config::{Config, Environment};
use layerconf_secrets::backends::kubernetes::DEFAULT_NAMESPACE_PATH;
use layerconf_secrets::backends::{ClusterSecretClient, KubernetesEngine};
use layerconf_secrets::vault::{VaultOptions, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable prefix for settings overrides
const ENV_PREFIX: &str = "LAYERCONF";

/// Separator for nested keys, e.g. `LAYERCONF_LOGGING__LOG_LEVEL`
const ENV_SEPARATOR: &str = "__";

/// Variable holding the comma separated active profiles
pub const DEFAULT_PROFILES_ENV_VAR: &str = "SPRING_PROFILES_ACTIVE";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResolverSettings {
    /// Fail instead of warning when placeholders survive every pass
    pub strict_placeholders: bool,

    /// Variable naming the active profiles
    #[validate(length(min = 1, message = "Profiles variable name cannot be empty"))]
    pub profiles_env_var: String,

    /// Timeout for Vault HTTP requests in seconds
    #[validate(range(min = 1, max = 300, message = "Vault timeout must be between 1 and 300 seconds"))]
    pub vault_timeout_seconds: u64,

    /// Service account JWT used for Vault KUBERNETES auth
    #[validate(length(min = 1, message = "Service account token path cannot be empty"))]
    pub service_account_token_path: String,

    /// File holding the pod's namespace for cluster secrets
    #[validate(length(min = 1, message = "Namespace path cannot be empty"))]
    pub namespace_path: String,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            strict_placeholders: false,
            profiles_env_var: DEFAULT_PROFILES_ENV_VAR.to_string(),
            vault_timeout_seconds: 30,
            service_account_token_path: DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH.to_string(),
            namespace_path: DEFAULT_NAMESPACE_PATH.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ResolverSettings {
    /// Load from defaults overlaid with `LAYERCONF_*` process variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(None)
    }

    /// Like [`ResolverSettings::from_env`], reading variables from `vars`
    /// instead of the process when given.
    pub fn from_vars(vars: Option<config::Map<String, String>>) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .ignore_empty(true)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(ConfigError::from)
    }

    pub fn vault_timeout(&self) -> Duration {
        Duration::from_secs(self.vault_timeout_seconds)
    }

    /// Options for Vault engines registered from configuration.
    pub fn vault_options(&self) -> VaultOptions {
        VaultOptions {
            timeout: self.vault_timeout(),
            service_account_token_path: self.service_account_token_path.clone().into(),
        }
    }

    /// A cluster secret engine reading its default namespace from
    /// `namespace_path`.
    pub fn kubernetes_engine(&self, client: Arc<dyn ClusterSecretClient>) -> KubernetesEngine {
        KubernetesEngine::new(client).with_namespace_path(&self.namespace_path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[validate(custom(function = "validate_log_level"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_log_level");
        error.message = Some("Log level must be one of trace, debug, info, warn, error".into());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn test_defaults() {
        let settings = ResolverSettings::from_vars(vars(&[])).unwrap();
        assert_eq!(settings, ResolverSettings::default());
        assert_eq!(settings.profiles_env_var, "SPRING_PROFILES_ACTIVE");
        assert_eq!(settings.vault_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let settings = ResolverSettings::from_vars(vars(&[
            ("LAYERCONF_STRICT_PLACEHOLDERS", "true"),
            ("LAYERCONF_VAULT_TIMEOUT_SECONDS", "5"),
            ("LAYERCONF_PROFILES_ENV_VAR", "APP_PROFILES"),
            ("LAYERCONF_LOGGING__LOG_LEVEL", "debug"),
            ("LAYERCONF_LOGGING__JSON_LOGGING", "true"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();

        assert!(settings.strict_placeholders);
        assert_eq!(settings.vault_timeout_seconds, 5);
        assert_eq!(settings.profiles_env_var, "APP_PROFILES");
        assert_eq!(settings.logging.log_level, "debug");
        assert!(settings.logging.json_logging);
        assert_eq!(settings.vault_options().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_out_of_range() {
        let err = ResolverSettings::from_vars(vars(&[("LAYERCONF_VAULT_TIMEOUT_SECONDS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 300"));
        match err {
            ConfigError::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("vault_timeout_seconds"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = ResolverSettings {
            logging: LoggingConfig { log_level: "loud".into(), json_logging: false },
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
