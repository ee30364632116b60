//! Cluster secret engine (`k8s`)
//!
//! References: `encrypted:k8s!n:<secret-name>!k:<data-key>[!ns:<namespace>]`.
//! Without `ns` the pod's own namespace is read from the service account
//! mount.

use super::backend::{Decrypter, EngineFactory, EngineKind};
use crate::error::{Result, SecretsError};
use crate::reference::{reject_unknown_params, required_param, split_params_first_colon};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where the in-cluster namespace is mounted.
pub const DEFAULT_NAMESPACE_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Narrow view of a Kubernetes API client.
#[async_trait]
pub trait ClusterSecretClient: Send + Sync + Debug {
    /// The secret's `data` section, already base64-decoded.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}

#[derive(Debug, Clone)]
pub struct KubernetesEngine {
    client: Arc<dyn ClusterSecretClient>,
    namespace_path: PathBuf,
}

impl KubernetesEngine {
    pub fn new(client: Arc<dyn ClusterSecretClient>) -> Self {
        Self { client, namespace_path: PathBuf::from(DEFAULT_NAMESPACE_PATH) }
    }

    /// Read the default namespace from somewhere other than the pod mount.
    pub fn with_namespace_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.namespace_path = path.into();
        self
    }

    // `build` is synchronous; the mount is a few bytes read once per reference.
    fn pod_namespace(&self) -> Option<String> {
        std::fs::read_to_string(&self.namespace_path)
            .ok()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
    }
}

impl EngineFactory for KubernetesEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        let engine = EngineKind::Kubernetes.as_str();
        let mut params = split_params_first_colon(raw_params, 2)?;
        let name = required_param(engine, &mut params, "n")?;
        let key = required_param(engine, &mut params, "k")?;
        let namespace = match params.remove("ns").filter(|ns| !ns.is_empty()) {
            Some(ns) => ns,
            None => self.pod_namespace().ok_or_else(|| {
                SecretsError::config(format!(
                    "could not determine namespace: pass '!ns:' or run in a pod where {} exists",
                    self.namespace_path.display()
                ))
            })?,
        };
        reject_unknown_params(engine, params, &[])?;

        Ok(Box::new(KubernetesDecrypter {
            client: Arc::clone(&self.client),
            namespace,
            name,
            key,
            is_file,
        }))
    }
}

#[derive(Debug)]
struct KubernetesDecrypter {
    client: Arc<dyn ClusterSecretClient>,
    namespace: String,
    name: String,
    key: String,
    is_file: bool,
}

#[async_trait]
impl Decrypter for KubernetesDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(namespace = %self.namespace, secret = %self.name, "Reading cluster secret");
        let mut data = self.client.get_secret(&self.namespace, &self.name).await?;
        let location = format!("secret {}/{}", self.namespace, self.name);
        if data.is_empty() {
            return Err(SecretsError::malformed(format!("the {} has no data", location)));
        }

        match data.remove(&self.key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => {
                let available = data.into_keys().filter(|k| k != &self.key).collect();
                Err(SecretsError::key_not_found(location, &self.key, available))
            }
        }
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}
