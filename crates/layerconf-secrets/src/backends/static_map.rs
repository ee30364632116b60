//! Fixed key/value engine.
//!
//! Handy for tests and for services that receive a small set of secrets out
//! of band at startup. References look like `encrypted:static!k:<key>`.

use super::backend::{Decrypter, EngineFactory, EngineKind};
use crate::error::{Result, SecretsError};
use crate::reference::{reject_unknown_params, required_param, split_params_strict};
use crate::types::SecretString;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StaticEngine {
    values: Arc<HashMap<String, SecretString>>,
}

impl StaticEngine {
    pub fn new(values: HashMap<String, SecretString>) -> Self {
        Self { values: Arc::new(values) }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), SecretString::new(v))).collect())
    }
}

impl EngineFactory for StaticEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        let engine = EngineKind::Static.as_str();
        let mut params = split_params_strict(raw_params, 1)?;
        let key = required_param(engine, &mut params, "k")?;
        reject_unknown_params(engine, params, &[])?;
        Ok(Box::new(StaticDecrypter { values: Arc::clone(&self.values), key, is_file }))
    }
}

#[derive(Debug)]
struct StaticDecrypter {
    values: Arc<HashMap<String, SecretString>>,
    key: String,
    is_file: bool,
}

#[async_trait]
impl Decrypter for StaticDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        self.values
            .get(&self.key)
            .map(|value| value.expose_secret().as_bytes().to_vec())
            .ok_or_else(|| {
                SecretsError::key_not_found(
                    "static engine",
                    &self.key,
                    self.values.keys().cloned().collect(),
                )
            })
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}
