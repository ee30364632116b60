//! Redacting wrapper for credentials held in memory.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Text that must never show up in logs: Vault tokens, login passwords,
/// service-account JWTs.
///
/// `Debug`, `Display` and `Serialize` all print `[REDACTED]`; the value is
/// only reachable through [`SecretString::expose_secret`]. The buffer is
/// zeroed on drop.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the plaintext. Do not log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted_everywhere() {
        let token = SecretString::new("s.abcdef");
        assert_eq!(format!("{:?}", token), "SecretString([REDACTED])");
        assert_eq!(token.to_string(), "[REDACTED]");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"[REDACTED]\"");
        assert_eq!(token.expose_secret(), "s.abcdef");
    }

    #[test]
    fn test_deserialize_keeps_plaintext() {
        let token: SecretString = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(token.expose_secret(), "hunter2");
        assert_eq!(token, SecretString::from("hunter2"));
    }
}
