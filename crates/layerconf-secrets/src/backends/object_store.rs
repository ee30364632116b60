//! Object store engines (`gcs` and `s3`)
//!
//! ```text
//! encrypted:gcs!b:<bucket>!f:<object>[!k:<dotted.yaml.key>]
//! encrypted:s3!r:<region>!b:<bucket>!f:<object>[!k:<dotted.yaml.key>]
//! ```
//!
//! Without `k` the whole object is the secret. With `k` the object is parsed
//! as YAML and the dotted key must lead to a string.

use super::backend::{Decrypter, EngineFactory, EngineKind};
use crate::error::{Result, SecretsError};
use crate::reference::{reject_unknown_params, required_param, split_params_first_colon};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::debug;

/// Which store an object lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectStoreFlavor {
    Gcs,
    S3,
}

impl ObjectStoreFlavor {
    fn kind(&self) -> EngineKind {
        match self {
            Self::Gcs => EngineKind::Gcs,
            Self::S3 => EngineKind::S3,
        }
    }
}

/// Address of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub flavor: ObjectStoreFlavor,
    /// Only set for S3.
    pub region: Option<String>,
    pub bucket: String,
    pub object: String,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.flavor {
            ObjectStoreFlavor::Gcs => write!(f, "gs://{}/{}", self.bucket, self.object),
            ObjectStoreFlavor::S3 => write!(f, "s3://{}/{}", self.bucket, self.object),
        }
    }
}

/// Narrow view of an object store SDK.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync + Debug {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct ObjectStoreEngine {
    flavor: ObjectStoreFlavor,
    client: Arc<dyn ObjectStoreClient>,
}

impl ObjectStoreEngine {
    pub fn gcs(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { flavor: ObjectStoreFlavor::Gcs, client }
    }

    pub fn s3(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self { flavor: ObjectStoreFlavor::S3, client }
    }

    /// Name to register this engine under.
    pub fn name(&self) -> &'static str {
        self.flavor.kind().as_str()
    }
}

impl EngineFactory for ObjectStoreEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        let engine = self.name();
        let mut params = split_params_first_colon(raw_params, 2)?;
        let region = match self.flavor {
            ObjectStoreFlavor::S3 => Some(required_param(engine, &mut params, "r")?),
            ObjectStoreFlavor::Gcs => None,
        };
        let bucket = required_param(engine, &mut params, "b")?;
        let object = required_param(engine, &mut params, "f")?;
        let key = params.remove("k").filter(|k| !k.is_empty());
        reject_unknown_params(engine, params, &[])?;

        Ok(Box::new(ObjectStoreDecrypter {
            client: Arc::clone(&self.client),
            location: ObjectLocation { flavor: self.flavor, region, bucket, object },
            key,
            is_file,
        }))
    }
}

#[derive(Debug)]
struct ObjectStoreDecrypter {
    client: Arc<dyn ObjectStoreClient>,
    location: ObjectLocation,
    key: Option<String>,
    is_file: bool,
}

#[async_trait]
impl Decrypter for ObjectStoreDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        debug!(location = %self.location, "Downloading secret object");
        let contents = self.client.get_object(&self.location).await?;
        if contents.is_empty() {
            return Err(SecretsError::malformed(format!("object {} is empty", self.location)));
        }

        match &self.key {
            Some(key) => yaml_string_at(&contents, key, &self.location).map(String::into_bytes),
            None => Ok(contents),
        }
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}

/// Follow a dotted key through a YAML document down to a string value.
fn yaml_string_at(contents: &[u8], dotted_key: &str, location: &ObjectLocation) -> Result<String> {
    let document: serde_yaml::Value = serde_yaml::from_slice(contents).map_err(|e| {
        SecretsError::malformed(format!("object {} is not valid YAML: {}", location, e))
    })?;

    let mut current = &document;
    for segment in dotted_key.split('.') {
        let mapping = current.as_mapping().ok_or_else(|| {
            SecretsError::malformed(format!(
                "key '{}' in {} passes through a non-mapping value",
                dotted_key, location
            ))
        })?;
        current = match mapping.get(segment) {
            Some(value) => value,
            None => {
                let available = mapping.keys().filter_map(|k| k.as_str().map(String::from)).collect();
                return Err(SecretsError::key_not_found(location.to_string(), dotted_key, available));
            }
        };
    }

    match current {
        serde_yaml::Value::String(value) => Ok(value.clone()),
        _ => Err(SecretsError::malformed(format!(
            "key '{}' in {} does not hold a string",
            dotted_key, location
        ))),
    }
}
