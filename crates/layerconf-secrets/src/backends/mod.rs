//! Pluggable secret engines
//!
//! Each engine turns the parameter text of a reference into a [`Decrypter`].
//! Engines that need a network SDK accept it through a narrow client trait.

pub mod backend;
pub mod kubernetes;
pub mod noop;
pub mod object_store;
pub mod registry;
pub mod secrets_manager;
pub mod static_map;

pub use backend::{Decrypter, EngineFactory, EngineKind};
pub use kubernetes::{ClusterSecretClient, KubernetesEngine};
pub use noop::NoopEngine;
pub use object_store::{ObjectLocation, ObjectStoreClient, ObjectStoreEngine, ObjectStoreFlavor};
pub use registry::EngineRegistry;
pub use secrets_manager::{SecretValue, SecretsManagerClient, SecretsManagerEngine};
pub use static_map::StaticEngine;
