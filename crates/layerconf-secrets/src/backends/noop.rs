//! Pass-through engine: the parameter text is the secret.

use super::backend::{Decrypter, EngineFactory};
use crate::error::Result;
use async_trait::async_trait;

/// `encrypted:noop!<value>` resolves to `<value>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEngine;

impl EngineFactory for NoopEngine {
    fn build(&self, is_file: bool, raw_params: &str) -> Result<Box<dyn Decrypter>> {
        Ok(Box::new(NoopDecrypter { value: raw_params.to_string(), is_file }))
    }
}

#[derive(Debug)]
struct NoopDecrypter {
    value: String,
    is_file: bool,
}

#[async_trait]
impl Decrypter for NoopDecrypter {
    async fn fetch(&self) -> Result<Vec<u8>> {
        Ok(self.value.as_bytes().to_vec())
    }

    fn is_file(&self) -> bool {
        self.is_file
    }
}
