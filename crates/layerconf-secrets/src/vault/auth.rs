//! Vault token acquisition and caching.

use super::client::{VaultApi, VaultResponse};
use super::config::{AuthMethod, VaultConfig, VAULT_TOKEN_ENV};
use crate::env::Environment;
use crate::error::{Result, SecretsError};
use crate::types::SecretString;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Where a pod's service account JWT is mounted.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Strategy for obtaining a fresh token, chosen once from the auth method.
#[derive(Debug, Clone)]
pub enum TokenFetcher {
    /// Read a token from an environment variable.
    Environment { env: Arc<dyn Environment>, var: String },
    /// Exchange the service account JWT at `auth/<mount>/login`.
    Kubernetes { mount: String, role: String, jwt_path: PathBuf },
    /// Log in at `auth/<mount>/login/<username>`.
    UserPass { mount: String, username: String, password: SecretString },
}

impl TokenFetcher {
    pub fn for_method(
        method: AuthMethod,
        config: &VaultConfig,
        env: Arc<dyn Environment>,
        jwt_path: PathBuf,
    ) -> Self {
        match method {
            AuthMethod::Token => Self::Environment { env, var: VAULT_TOKEN_ENV.to_string() },
            AuthMethod::Kubernetes => Self::Kubernetes {
                mount: config.path.clone(),
                role: config.role.clone(),
                jwt_path,
            },
            AuthMethod::UserPass => Self::UserPass {
                mount: config.user_auth_path.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Self::Environment { .. } => AuthMethod::Token,
            Self::Kubernetes { .. } => AuthMethod::Kubernetes,
            Self::UserPass { .. } => AuthMethod::UserPass,
        }
    }

    /// Obtain a token. Every failure is an authentication error.
    pub async fn fetch_token(&self, api: &dyn VaultApi) -> Result<SecretString> {
        self.try_fetch(api).await.map_err(|message| {
            SecretsError::authentication_failed(format!("error fetching vault token - {}", message))
        })
    }

    async fn try_fetch(&self, api: &dyn VaultApi) -> std::result::Result<SecretString, String> {
        match self {
            Self::Environment { env, var } => env
                .var(var)
                .filter(|t| !t.is_empty())
                .map(SecretString::new)
                .ok_or_else(|| format!("{} environment variable not set", var)),
            Self::Kubernetes { mount, role, jwt_path } => {
                let jwt = tokio::fs::read_to_string(jwt_path).await.map_err(|e| {
                    format!("error reading service account token {}: {}", jwt_path.display(), e)
                })?;
                let login_path = format!("auth/{}/login", mount);
                info!(login_path = %login_path, "Logging into Vault with KUBERNETES auth");
                let response = api
                    .write(&login_path, None, json!({ "role": role, "jwt": jwt.trim() }))
                    .await
                    .map_err(|e| format!("error logging into vault using kubernetes auth: {}", e))?;
                client_token(response)
            }
            Self::UserPass { mount, username, password } => {
                let login_path = format!("auth/{}/login/{}", mount, username);
                info!(login_path = %login_path, "Logging into Vault with USERPASS auth");
                let response = api
                    .write(&login_path, None, json!({ "password": password.expose_secret() }))
                    .await
                    .map_err(|e| {
                        format!("error logging into vault using user/password auth: {}", e)
                    })?;
                client_token(response)
            }
        }
    }
}

fn client_token(response: Option<VaultResponse>) -> std::result::Result<SecretString, String> {
    response
        .and_then(|r| r.auth)
        .map(|auth| auth.client_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| "login response did not include a client token".to_string())
}

/// The engine's single cached token.
///
/// All reads and writes go through one async mutex so concurrent resolutions
/// never fetch twice for the same expiry.
#[derive(Debug)]
pub struct TokenCache {
    fetcher: TokenFetcher,
    token: Mutex<Option<SecretString>>,
}

impl TokenCache {
    pub fn new(fetcher: TokenFetcher, preset: Option<SecretString>) -> Self {
        Self { fetcher, token: Mutex::new(preset.filter(|t| !t.is_empty())) }
    }

    /// The cached token, fetching one first if the cache is empty.
    pub async fn token(&self, api: &dyn VaultApi) -> Result<SecretString> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let token = self.fetcher.fetch_token(api).await?;
        info!(auth_method = %self.fetcher.method(), "Obtained Vault token");
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Replace `stale` with a fresh token.
    ///
    /// If another caller already replaced it, the newer token is returned
    /// without fetching again. On failure the cache is left empty.
    pub async fn refresh(&self, api: &dyn VaultApi, stale: &SecretString) -> Result<SecretString> {
        let mut cached = self.token.lock().await;
        if let Some(current) = cached.as_ref() {
            if current != stale {
                debug!("Vault token already refreshed by another caller");
                return Ok(current.clone());
            }
        }
        *cached = None;
        let token = self.fetcher.fetch_token(api).await?;
        info!(auth_method = %self.fetcher.method(), "Refreshed Vault token");
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }
}
