//! Vault secret engine
//!
//! References: `encrypted:vault!e:<engine>!p:<path>!k:<key>[!b:true]`.
//! `n` is accepted as a deprecated alias of `p`. With `b:true` the stored
//! value is base64-decoded before use.

use super::auth::{TokenCache, TokenFetcher, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};
use super::client::{HttpVaultClient, VaultApi, VaultApiError, VaultResponse};
use super::config::VaultConfig;
use crate::backends::{Decrypter, EngineFactory};
use crate::env::Environment;
use crate::error::{Result, SecretsError};
use crate::reference::split_params_lenient;
use crate::types::SecretString;
use async_trait::async_trait;
use base64::Engine as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Warning Vault attaches when a KV v1 style path is read on a KV v2 mount.
pub const VERSIONED_KV_WARNING: &str = "Invalid path for a versioned K/V secrets engine";

/// Knobs that are not part of the `secrets.vault` section.
#[derive(Debug, Clone)]
pub struct VaultOptions {
    pub timeout: Duration,
    pub service_account_token_path: PathBuf,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            service_account_token_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
        }
    }
}

#[derive(Debug)]
struct VaultShared {
    config: VaultConfig,
    api: Arc<dyn VaultApi>,
    tokens: TokenCache,
}

/// Factory for `vault` references. Clones share one token cache.
#[derive(Debug, Clone)]
pub struct VaultEngine {
    shared: Arc<VaultShared>,
}

impl VaultEngine {
    /// Validate `config` and connect over HTTP.
    pub fn connect(
        config: VaultConfig,
        env: Arc<dyn Environment>,
        options: &VaultOptions,
    ) -> Result<Self> {
        let api = HttpVaultClient::new(&config.url, config.namespace(), options.timeout)?;
        Self::with_client(config, env, Arc::new(api), options)
    }

    /// Validate `config` and use the given API implementation.
    pub fn with_client(
        config: VaultConfig,
        env: Arc<dyn Environment>,
        api: Arc<dyn VaultApi>,
        options: &VaultOptions,
    ) -> Result<Self> {
        let method = config.validate(env.as_ref())?;
        let fetcher = TokenFetcher::for_method(
            method,
            &config,
            env,
            options.service_account_token_path.clone(),
        );
        let preset = Some(config.token.clone());
        info!(url = %config.url, auth_method = %method, "Configured Vault secret engine");
        Ok(Self { shared: Arc::new(VaultShared { config, api, tokens: TokenCache::new(fetcher, preset) }) })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.shared.config
    }
}

impl EngineFactory for VaultEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        let mut params = split_params_lenient(raw_params);
        let mut take = |key: &str| params.remove(key).filter(|v| !v.is_empty());

        let engine =
            take("e").ok_or_else(|| SecretsError::format("'e' for engine is required"))?;
        let path = take("p").or_else(|| take("n")).ok_or_else(|| {
            SecretsError::format("'p' for path is required (replaces deprecated 'n' param)")
        })?;
        let key = take("k").ok_or_else(|| SecretsError::format("'k' for key is required"))?;
        let base64 = take("b").is_some_and(|b| b.eq_ignore_ascii_case("true"));

        Ok(Box::new(VaultDecrypter {
            shared: Arc::clone(&self.shared),
            engine,
            path,
            key,
            base64,
            is_file,
        }))
    }
}

#[derive(Debug)]
pub struct VaultDecrypter {
    shared: Arc<VaultShared>,
    engine: String,
    path: String,
    key: String,
    base64: bool,
    is_file: bool,
}

impl VaultDecrypter {
    /// Read the secret with `token`, falling back from the KV v1 layout to
    /// KV v2 when Vault says the mount is versioned.
    pub async fn fetch_secret(&self, token: &SecretString) -> Result<String> {
        let v1_path = format!("{}/{}", self.engine, self.path);
        debug!(path = %v1_path, "Reading secret at KV v1 path");
        let mut response = self.read(&v1_path, token).await?;

        if response.as_ref().is_some_and(|r| r.has_warning(VERSIONED_KV_WARNING)) {
            let v2_path = format!("{}/data/{}", self.engine, self.path);
            debug!(path = %v2_path, "Reading secret at KV v2 path");
            response = self.read(&v2_path, token).await?;
        }

        let response = response.ok_or_else(|| {
            SecretsError::not_found(format!(
                "couldn't find vault path {} under engine {}",
                self.path, self.engine
            ))
        })?;

        let mut data = response.data.unwrap_or_default();
        // KV v2 nests the secret one level deeper
        if let Some(serde_json::Value::Object(inner)) = data.remove("data") {
            data = inner;
        }

        match data.get(&self.key) {
            Some(serde_json::Value::String(value)) => {
                debug!(engine = %self.engine, path = %self.path, "Fetched secret from Vault");
                Ok(value.clone())
            }
            _ => Err(SecretsError::key_not_found(
                format!("vault engine '{}' path '{}'", self.engine, self.path),
                &self.key,
                data.keys().cloned().collect(),
            )),
        }
    }

    async fn read(&self, path: &str, token: &SecretString) -> Result<Option<VaultResponse>> {
        self.shared.api.read(path, Some(token)).await.map_err(|e| match e {
            VaultApiError::Forbidden { message } => SecretsError::forbidden(message),
            VaultApiError::MalformedResponse { .. } => SecretsError::connection_failed(format!(
                "error fetching secret from vault - check connection to the server: {}",
                self.shared.config.url
            )),
            VaultApiError::Transport { message } => SecretsError::connection_failed(format!(
                "error fetching secret from vault at {}: {}",
                self.shared.config.url, message
            )),
            other @ VaultApiError::Status { .. } => {
                SecretsError::backend_error(format!("error fetching secret from vault: {}", other))
            }
        })
    }
}

#[async_trait]
impl Decrypter for VaultDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        let api = self.shared.api.as_ref();
        let token = self.shared.tokens.token(api).await?;

        let value = match self.fetch_secret(&token).await {
            Err(e) if e.is_forbidden() => {
                warn!(engine = %self.engine, path = %self.path, "Vault rejected the cached token, refreshing once");
                let fresh = self.shared.tokens.refresh(api, &token).await?;
                self.fetch_secret(&fresh).await?
            }
            other => other?,
        };

        if self.base64 {
            return base64::engine::general_purpose::STANDARD.decode(value.trim()).map_err(|e| {
                SecretsError::malformed(format!(
                    "value at vault engine '{}' path '{}' key '{}' is not valid base64: {}",
                    self.engine, self.path, self.key, e
                ))
            });
        }
        Ok(value.into_bytes())
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::client::VaultAuth;
    use crate::vault::config::VAULT_TOKEN_ENV;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tracing_test::traced_test;

    type Reply = std::result::Result<Option<VaultResponse>, VaultApiError>;

    /// Scripted Vault: pops one canned reply per read, records paths and tokens.
    #[derive(Debug, Default)]
    struct ScriptedVault {
        replies: Mutex<VecDeque<Reply>>,
        reads: Mutex<Vec<(String, String)>>,
        logins: AtomicUsize,
    }

    impl ScriptedVault {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), ..Default::default() })
        }

        fn read_paths(&self) -> Vec<String> {
            self.reads.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl VaultApi for ScriptedVault {
        async fn read(&self, path: &str, token: Option<&SecretString>) -> Reply {
            let token = token.map(|t| t.expose_secret().to_string()).unwrap_or_default();
            self.reads.lock().unwrap().push((path.to_string(), token));
            self.replies.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        async fn write(
            &self,
            _path: &str,
            _token: Option<&SecretString>,
            _body: serde_json::Value,
        ) -> Reply {
            let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Some(VaultResponse {
                auth: Some(VaultAuth { client_token: SecretString::new(format!("s.login{}", n)) }),
                ..Default::default()
            }))
        }
    }

    fn data(value: serde_json::Value) -> Reply {
        let serde_json::Value::Object(map) = value else { panic!("object expected") };
        Ok(Some(VaultResponse { data: Some(map), ..Default::default() }))
    }

    fn versioned_warning() -> Reply {
        Ok(Some(VaultResponse {
            warnings: Some(vec![format!("{}. This path is for KV v1 mounts.", VERSIONED_KV_WARNING)]),
            ..Default::default()
        }))
    }

    fn forbidden() -> Reply {
        Err(VaultApiError::Forbidden { message: "permission denied".into() })
    }

    fn userpass_config() -> VaultConfig {
        VaultConfig {
            enabled: true,
            url: "https://vault:8200".into(),
            auth_method: "USERPASS".into(),
            username: "svc".into(),
            password: SecretString::new("pw"),
            user_auth_path: "userpass".into(),
            ..Default::default()
        }
    }

    fn engine(api: Arc<ScriptedVault>) -> VaultEngine {
        VaultEngine::with_client(
            userpass_config(),
            Arc::new(HashMap::<String, String>::new()),
            api,
            &VaultOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_param_parsing() {
        let engine = engine(ScriptedVault::new(vec![]));
        assert!(engine.build(false, "e:secret!p:app!k:pw").is_ok());
        assert!(engine.build(false, "e:secret!n:app!k:pw").is_ok());

        let err = engine.build(false, "p:app!k:pw").unwrap_err();
        assert!(err.to_string().contains("'e' for engine is required"));
        let err = engine.build(false, "e:secret!k:pw").unwrap_err();
        assert!(err.to_string().contains("replaces deprecated 'n' param"));
        let err = engine.build(false, "e:secret!p:app").unwrap_err();
        assert!(err.to_string().contains("'k' for key is required"));

        // malformed tokens are skipped rather than rejected
        assert!(engine.build(false, "e:secret!junk!p:app!k:pw!x:y:z").is_ok());
    }

    #[tokio::test]
    async fn test_kv_v1_read() {
        let api = ScriptedVault::new(vec![data(json!({ "password": "pw1" }))]);
        let d = engine(api.clone()).build(false, "e:secret!p:app/db!k:password").unwrap();
        assert_eq!(d.decrypt().await.unwrap(), "pw1");
        assert_eq!(api.read_paths(), vec!["secret/app/db"]);
        assert_eq!(api.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_kv_v2_fallback_on_versioned_warning() {
        let api = ScriptedVault::new(vec![
            versioned_warning(),
            data(json!({ "data": { "password": "pw2" }, "metadata": { "version": 3 } })),
        ]);
        let d = engine(api.clone()).build(false, "e:kv!p:app/db!k:password").unwrap();
        assert_eq!(d.decrypt().await.unwrap(), "pw2");
        assert_eq!(api.read_paths(), vec!["kv/app/db", "kv/data/app/db"]);
    }

    #[tokio::test]
    async fn test_kv_v2_path_missing() {
        let api = ScriptedVault::new(vec![versioned_warning(), Ok(None)]);
        let d = engine(api).build(false, "e:kv!p:app/db!k:password").unwrap();
        let err = d.decrypt().await.unwrap_err();
        assert_eq!(err.to_string(), "Secret not found: couldn't find vault path app/db under engine kv");
    }

    #[tokio::test]
    async fn test_missing_key_names_engine_and_path() {
        let api = ScriptedVault::new(vec![
            versioned_warning(),
            data(json!({ "data": { "user": "u", "host": "h" } })),
        ]);
        let d = engine(api).build(false, "e:kv!p:app/db!k:password").unwrap();
        let err = d.decrypt().await.unwrap_err();
        assert!(matches!(err, SecretsError::KeyNotFound { .. }));
        let message = err.to_string();
        assert!(message.contains("engine 'kv'"));
        assert!(message.contains("path 'app/db'"));
        assert!(message.contains("host, user"));
    }

    #[tokio::test]
    async fn test_forbidden_refreshes_once_and_retries() {
        let api = ScriptedVault::new(vec![forbidden(), data(json!({ "password": "pw" }))]);
        let d = engine(api.clone()).build(false, "e:secret!p:app!k:password").unwrap();
        assert_eq!(d.decrypt().await.unwrap(), "pw");

        assert_eq!(api.logins.load(Ordering::SeqCst), 2);
        let reads = api.reads.lock().unwrap().clone();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].1, "s.login1");
        assert_eq!(reads[1].1, "s.login2");
    }

    #[traced_test]
    #[tokio::test]
    async fn test_refresh_is_logged_without_token() {
        let api = ScriptedVault::new(vec![forbidden(), data(json!({ "password": "pw" }))]);
        let d = engine(api).build(false, "e:secret!p:app!k:password").unwrap();
        d.decrypt().await.unwrap();
        assert!(logs_contain("refreshing once"));
        assert!(!logs_contain("s.login2"));
    }

    #[tokio::test]
    async fn test_second_forbidden_surfaces() {
        let api = ScriptedVault::new(vec![forbidden(), forbidden(), data(json!({ "password": "pw" }))]);
        let d = engine(api.clone()).build(false, "e:secret!p:app!k:password").unwrap();
        let err = d.decrypt().await.unwrap_err();
        assert!(err.is_forbidden());
        assert_eq!(api.logins.load(Ordering::SeqCst), 2);
        assert_eq!(api.read_paths().len(), 2);
    }

    #[tokio::test]
    async fn test_token_is_shared_across_decrypters() {
        let api = ScriptedVault::new(vec![
            data(json!({ "a": "1" })),
            data(json!({ "b": "2" })),
        ]);
        let engine = engine(api.clone());
        engine.build(false, "e:secret!p:x!k:a").unwrap().decrypt().await.unwrap();
        engine.build(false, "e:secret!p:y!k:b").unwrap().decrypt().await.unwrap();
        assert_eq!(api.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_names_url() {
        let api = ScriptedVault::new(vec![Err(VaultApiError::MalformedResponse {
            message: "expected value at line 1 column 1".into(),
        })]);
        let d = engine(api).build(false, "e:secret!p:app!k:password").unwrap();
        let err = d.decrypt().await.unwrap_err();
        assert!(matches!(err, SecretsError::ConnectionFailed { .. }));
        assert!(err.to_string().contains("check connection to the server: https://vault:8200"));
    }

    #[tokio::test]
    async fn test_base64_flag_decodes() {
        let api = ScriptedVault::new(vec![data(json!({ "cert": "aGVsbG8gdmF1bHQ=" }))]);
        let d = engine(api).build(false, "e:secret!p:tls!k:cert!b:true").unwrap();
        assert_eq!(d.decrypt().await.unwrap(), "hello vault");
    }

    #[tokio::test]
    async fn test_file_reference_materializes() {
        let api = ScriptedVault::new(vec![data(json!({ "key": "PEM" }))]);
        let d = engine(api).build(true, "e:secret!p:tls!k:key").unwrap();
        let path = d.decrypt().await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "PEM");
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_preset_token_method() {
        let config = VaultConfig {
            enabled: true,
            url: "https://vault:8200".into(),
            auth_method: "TOKEN".into(),
            token: SecretString::new("s.preset"),
            ..Default::default()
        };
        let env: HashMap<String, String> =
            [(VAULT_TOKEN_ENV.to_string(), "s.from-env".to_string())].into_iter().collect();
        let api = ScriptedVault::new(vec![forbidden(), data(json!({ "k": "v" }))]);
        let engine =
            VaultEngine::with_client(config, Arc::new(env), api.clone(), &VaultOptions::default())
                .unwrap();
        assert_eq!(engine.build(false, "e:s!p:p!k:k").unwrap().decrypt().await.unwrap(), "v");

        let reads = api.reads.lock().unwrap().clone();
        assert_eq!(reads[0].1, "s.preset");
        assert_eq!(reads[1].1, "s.from-env");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = VaultConfig { url: String::new(), ..userpass_config() };
        let err = VaultEngine::with_client(
            config,
            Arc::new(HashMap::<String, String>::new()),
            ScriptedVault::new(vec![]),
            &VaultOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SecretsError::Config { .. }));
    }
}
