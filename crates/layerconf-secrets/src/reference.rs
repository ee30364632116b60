//! Secret reference grammar.
//!
//! ```text
//! secretRef := prefix ":" engineName ("!" param)*
//! prefix    := "encrypted" | "encryptedFile"
//! param     := shortKey ":" value
//! ```
//!
//! Parsing here only splits off the prefix and engine name. Each engine
//! decides how strictly to split its own parameter text, because some of them
//! carry colon-bearing values such as resource identifiers.

use crate::error::{Result, SecretsError};
use std::collections::HashMap;
use std::fmt;

const VALUE_PREFIX: &str = "encrypted:";
const FILE_PREFIX: &str = "encryptedFile:";
const PARAM_SEPARATOR: char = '!';
const KEY_VALUE_SEPARATOR: char = ':';

/// A parsed `encrypted[File]:<engine>!<params>` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub engine: String,
    pub is_file: bool,
    /// Everything after the first `!`, untouched.
    pub params: String,
}

impl SecretReference {
    /// Recognise a secret reference.
    ///
    /// Returns `Ok(None)` for text that is not a reference at all: anything
    /// without an `encrypted:`/`encryptedFile:` prefix, and prefixed text with
    /// no `!` (so `encrypted:s3` stays a plain string). An empty engine name
    /// is a format error.
    pub fn detect(text: &str) -> Result<Option<Self>> {
        let (is_file, rest) = if let Some(rest) = text.strip_prefix(FILE_PREFIX) {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix(VALUE_PREFIX) {
            (false, rest)
        } else {
            return Ok(None);
        };

        let Some((engine, params)) = rest.split_once(PARAM_SEPARATOR) else {
            return Ok(None);
        };

        if engine.is_empty() {
            return Err(SecretsError::format(format!(
                "engine name is missing in '{}'",
                redact(text)
            )));
        }

        Ok(Some(Self { engine: engine.to_string(), is_file, params: params.to_string() }))
    }

    /// True when `text` would be treated as a secret reference.
    pub fn is_reference(text: &str) -> bool {
        matches!(Self::detect(text), Ok(Some(_)) | Err(_))
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_file { FILE_PREFIX } else { VALUE_PREFIX };
        write!(f, "{}{}{}{}", prefix, self.engine, PARAM_SEPARATOR, self.params)
    }
}

/// Split params where every token must be exactly `key:value`.
///
/// Requires at least `min_tokens` tokens. Used by engines whose values never
/// contain a colon.
pub fn split_params_strict(raw: &str, min_tokens: usize) -> Result<HashMap<String, String>> {
    let tokens: Vec<&str> = raw.split(PARAM_SEPARATOR).collect();
    if tokens.len() < min_tokens {
        return Err(SecretsError::format(format!(
            "expected at least {} '!'-separated parameters, got {}",
            min_tokens,
            tokens.len()
        )));
    }

    let mut params = HashMap::with_capacity(tokens.len());
    for token in tokens {
        let mut parts = token.split(KEY_VALUE_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                params.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(SecretsError::format(format!(
                    "parameter '{}' must contain exactly one ':'",
                    token
                )));
            }
        }
    }
    Ok(params)
}

/// Split params on the first `:` of each token only, so values may carry
/// colons. Requires at least `min_tokens` tokens and rejects tokens with no
/// colon at all.
pub fn split_params_first_colon(raw: &str, min_tokens: usize) -> Result<HashMap<String, String>> {
    let tokens: Vec<&str> = raw.split(PARAM_SEPARATOR).collect();
    if tokens.len() < min_tokens {
        return Err(SecretsError::format(format!(
            "expected at least {} '!'-separated parameters, got {}",
            min_tokens,
            tokens.len()
        )));
    }

    tokens
        .into_iter()
        .map(|token| {
            token
                .split_once(KEY_VALUE_SEPARATOR)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    SecretsError::format(format!("parameter '{}' is missing a ':'", token))
                })
        })
        .collect()
}

/// Split params leniently: tokens that are not exactly `key:value` are
/// skipped. Used by the Vault engine.
pub fn split_params_lenient(raw: &str) -> HashMap<String, String> {
    raw.split(PARAM_SEPARATOR)
        .filter_map(|token| {
            let mut parts = token.split(KEY_VALUE_SEPARATOR);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(v), None) => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Remove the entries an engine understands and fail on whatever is left.
pub fn reject_unknown_params(
    engine: &str,
    mut params: HashMap<String, String>,
    known: &[&str],
) -> Result<()> {
    for key in known {
        params.remove(*key);
    }
    if params.is_empty() {
        return Ok(());
    }
    let mut unknown: Vec<String> = params.into_keys().collect();
    unknown.sort();
    Err(SecretsError::format(format!(
        "unknown parameters for engine '{}': {}",
        engine,
        unknown.join(", ")
    )))
}

/// Take a required parameter out of the map.
pub fn required_param(
    engine: &str,
    params: &mut HashMap<String, String>,
    key: &str,
) -> Result<String> {
    match params.remove(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(SecretsError::format(format!("engine '{}' requires parameter '{}'", engine, key))),
    }
}

// Parameters can name paths worth keeping out of logs; keep only the head.
fn redact(text: &str) -> String {
    match text.find(PARAM_SEPARATOR) {
        Some(idx) => format!("{}!...", &text[..idx]),
        None => text.to_string(),
    }
}
