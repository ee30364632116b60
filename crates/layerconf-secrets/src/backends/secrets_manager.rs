//! Cloud secrets manager engine
//!
//! References: `encrypted:secrets-manager!r:<region>!s:<secret-name>[!k:<key>]`.
//! With `k`, the secret's string payload must be a JSON object and the value
//! under `k` is returned. File references take the binary payload when the
//! secret has one and may not name a key.

use super::backend::{Decrypter, EngineFactory, EngineKind};
use crate::error::{Result, SecretsError};
use crate::reference::{reject_unknown_params, required_param, split_params_strict};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Payload of one secret as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretValue {
    pub string: Option<String>,
    pub binary: Option<Vec<u8>>,
}

/// Narrow view of a cloud secrets manager SDK.
#[async_trait]
pub trait SecretsManagerClient: Send + Sync + Debug {
    async fn get_secret_value(&self, region: &str, secret_name: &str) -> Result<SecretValue>;
}

#[derive(Debug, Clone)]
pub struct SecretsManagerEngine {
    client: Arc<dyn SecretsManagerClient>,
}

impl SecretsManagerEngine {
    pub fn new(client: Arc<dyn SecretsManagerClient>) -> Self {
        Self { client }
    }
}

impl EngineFactory for SecretsManagerEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        let engine = EngineKind::SecretsManager.as_str();
        let mut params = split_params_strict(raw_params, 2)?;
        let region = required_param(engine, &mut params, "r")?;
        let secret_name = required_param(engine, &mut params, "s")?;
        let key = params.remove("k").filter(|k| !k.is_empty());
        if is_file && key.is_some() {
            return Err(SecretsError::format(
                "file references to the secrets manager must not set 'k'; point at a binary secret instead",
            ));
        }
        reject_unknown_params(engine, params, &[])?;

        Ok(Box::new(SecretsManagerDecrypter {
            client: Arc::clone(&self.client),
            region,
            secret_name,
            key,
            is_file,
        }))
    }
}

#[derive(Debug)]
struct SecretsManagerDecrypter {
    client: Arc<dyn SecretsManagerClient>,
    region: String,
    secret_name: String,
    key: Option<String>,
    is_file: bool,
}

#[async_trait]
impl Decrypter for SecretsManagerDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(region = %self.region, secret = %self.secret_name, "Fetching secret from secrets manager");
        let value = self.client.get_secret_value(&self.region, &self.secret_name).await?;

        if self.is_file {
            if let Some(binary) = value.binary.filter(|b| !b.is_empty()) {
                return Ok(binary);
            }
        }

        let text = value.string.ok_or_else(|| {
            SecretsError::malformed(format!("secret '{}' has no string payload", self.secret_name))
        })?;

        match &self.key {
            Some(key) => extract_json_key(&text, key).map(String::into_bytes),
            None => Ok(text.into_bytes()),
        }
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}

fn extract_json_key(payload: &str, key: &str) -> Result<String> {
    let malformed = || {
        SecretsError::malformed(
            "expected the secret payload to be a JSON object of string values".to_string(),
        )
    };
    let map: HashMap<String, serde_json::Value> =
        serde_json::from_str(payload).map_err(|_| malformed())?;
    match map.get(key) {
        Some(serde_json::Value::String(value)) => Ok(value.clone()),
        _ => Err(malformed()),
    }
}
