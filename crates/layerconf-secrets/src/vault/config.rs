//! Vault connection and authentication settings.

use crate::env::Environment;
use crate::error::{Result, SecretsError};
use crate::types::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable consulted by the `TOKEN` auth method.
pub const VAULT_TOKEN_ENV: &str = "VAULT_TOKEN";

/// How the engine obtains its bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// Pre-set token, or `VAULT_TOKEN` from the environment
    Token,
    /// Service account JWT exchanged at `auth/<path>/login`
    Kubernetes,
    /// Username/password login at `auth/<userAuthPath>/login/<username>`
    UserPass,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "TOKEN",
            Self::Kubernetes => "KUBERNETES",
            Self::UserPass => "USERPASS",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TOKEN" => Ok(Self::Token),
            "KUBERNETES" => Ok(Self::Kubernetes),
            "USERPASS" => Ok(Self::UserPass),
            other => Err(config_error(format!("unknown Vault secrets auth method: {:?}", other))),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `secrets.vault` section of a configuration tree.
///
/// Every field is optional on input; [`VaultConfig::validate`] decides what
/// the chosen auth method actually needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultConfig {
    #[serde(deserialize_with = "weak_bool")]
    pub enabled: bool,
    pub url: String,
    pub auth_method: String,
    pub role: String,
    pub path: String,
    pub username: String,
    pub password: SecretString,
    pub user_auth_path: String,
    pub namespace: String,
    /// Pre-set token for the `TOKEN` method; seeds the token cache.
    pub token: SecretString,
}

impl VaultConfig {
    /// Check that the section is complete for its auth method.
    pub fn validate(&self, env: &dyn Environment) -> Result<AuthMethod> {
        if self == &Self::default() {
            return Err(config_error("vault secrets not configured in service profile yaml"));
        }
        if !self.enabled {
            return Err(config_error("vault secrets disabled"));
        }
        if self.url.is_empty() {
            return Err(config_error("vault url required"));
        }
        if self.auth_method.is_empty() {
            return Err(config_error("auth method required"));
        }

        let method: AuthMethod = self.auth_method.parse()?;
        match method {
            AuthMethod::Token => {
                let env_token = env.var(VAULT_TOKEN_ENV).filter(|t| !t.is_empty());
                if self.token.is_empty() && env_token.is_none() {
                    return Err(config_error(format!(
                        "{} environment variable not set",
                        VAULT_TOKEN_ENV
                    )));
                }
            }
            AuthMethod::Kubernetes => {
                if self.path.is_empty() || self.role.is_empty() {
                    return Err(config_error(
                        "path and role both required for Kubernetes auth method",
                    ));
                }
            }
            AuthMethod::UserPass => {
                if self.username.is_empty()
                    || self.password.is_empty()
                    || self.user_auth_path.is_empty()
                {
                    return Err(config_error(
                        "username, password and userAuthPath are required for user/password auth method",
                    ));
                }
            }
        }
        Ok(method)
    }

    /// Namespace header value, if one is configured.
    pub fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }
}

fn config_error(message: impl fmt::Display) -> SecretsError {
    SecretsError::config(format!("vault configuration error - {}", message))
}

/// Accept `true`, `"true"`, `"1"`, `"f"` and the other spellings a
/// stringified tree can produce. An empty string is `false`.
fn weak_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Text(s) => match s.trim() {
            "" => Ok(false),
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "cannot parse '{}' as a boolean for 'enabled'",
                other
            ))),
        },
    }
}
