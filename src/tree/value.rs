//! Raw fragment values and the normalized tree they become.
//!
//! Fragments carry typed scalars ([`Value`]). Before placeholders are
//! resolved every scalar is rendered to its canonical text, leaving a tree of
//! strings, sequences and mappings ([`ConfigValue`]).

use super::path::{LeafPath, PathSegment};
use crate::errors::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Mapping = BTreeMap<String, Value>;

/// One parsed configuration document.
pub type Fragment = Mapping;

/// A value as it appears in a fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Convert a parsed YAML document. Tags are dropped; mapping keys must
    /// be scalars.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Self> {
        Ok(match value {
            serde_yaml::Value::Null => Self::Null,
            serde_yaml::Value::Bool(b) => Self::Bool(b),
            serde_yaml::Value::Number(n) => number_from_yaml(&n),
            serde_yaml::Value::String(s) => Self::String(s),
            serde_yaml::Value::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::from_yaml).collect::<Result<_>>()?)
            }
            serde_yaml::Value::Mapping(entries) => {
                let mut mapping = Mapping::new();
                for (key, value) in entries {
                    mapping.insert(yaml_key(key)?, Self::from_yaml(value)?);
                }
                Self::Mapping(mapping)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(tagged.value)?,
        })
    }

    /// Convert a parsed JSON document.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Integer(i128::from(u))
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => {
                Self::Mapping(entries.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect())
            }
        }
    }

    /// Render scalars to canonical text, recursively.
    pub fn normalize(self) -> ConfigValue {
        match self {
            Self::Null => ConfigValue::String(String::new()),
            Self::Bool(b) => ConfigValue::String(b.to_string()),
            Self::Integer(i) => ConfigValue::String(i.to_string()),
            Self::Float(f) => ConfigValue::String(canonical_float(f)),
            Self::String(s) => ConfigValue::String(s),
            Self::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(Self::normalize).collect())
            }
            Self::Mapping(entries) => ConfigValue::Mapping(normalize_mapping(entries)),
        }
    }
}

/// Normalize a whole fragment.
pub fn normalize_mapping(mapping: Mapping) -> BTreeMap<String, ConfigValue> {
    mapping.into_iter().map(|(k, v)| (k, v.normalize())).collect()
}

/// Shortest text that parses back to the same float, in `%g` style: plain
/// decimal for exponents from -4 to 5, otherwise `d.ddde+XX` with at least
/// two exponent digits. Non-finite values use `NaN`, `+Inf` and `-Inf`.
pub fn canonical_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    } else if f == f64::INFINITY {
        return "+Inf".to_string();
    } else if f == f64::NEG_INFINITY {
        return "-Inf".to_string();
    }

    // `{:e}` yields the shortest round-trip mantissa, e.g. `1.5e300`
    let scientific = format!("{:e}", f);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return f.to_string();
    };
    let exponent: i32 = exponent.parse().unwrap_or_default();
    if (-4..6).contains(&exponent) {
        f.to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
    }
}

fn number_from_yaml(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Integer(i128::from(i))
    } else if let Some(u) = n.as_u64() {
        Value::Integer(i128::from(u))
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String> {
    match Value::from_yaml(key)? {
        Value::Sequence(_) | Value::Mapping(_) => {
            Err(ConfigError::fragment("mapping keys must be scalars"))
        }
        scalar => match scalar.normalize() {
            ConfigValue::String(s) => Ok(s),
            _ => Err(ConfigError::fragment("mapping keys must be scalars")),
        },
    }
}

/// A normalized tree: every leaf is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(BTreeMap<String, ConfigValue>),
}

impl Default for ConfigValue {
    fn default() -> Self {
        Self::Mapping(BTreeMap::new())
    }
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Follow a dotted key through nested mappings.
    pub fn get(&self, flat_key: &str) -> Option<&ConfigValue> {
        flat_key.split('.').try_fold(self, |node, segment| node.as_mapping()?.get(segment))
    }

    /// String leaf at a dotted key.
    pub fn get_str(&self, flat_key: &str) -> Option<&str> {
        self.get(flat_key).and_then(Self::as_str)
    }

    pub fn at(&self, path: &LeafPath) -> Option<&ConfigValue> {
        path.segments().iter().try_fold(self, |node, segment| match (node, segment) {
            (Self::Mapping(m), PathSegment::Key(k)) => m.get(k),
            (Self::Sequence(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        })
    }

    pub fn at_mut(&mut self, path: &LeafPath) -> Option<&mut ConfigValue> {
        path.segments().iter().try_fold(self, |node, segment| match (node, segment) {
            (Self::Mapping(m), PathSegment::Key(k)) => m.get_mut(k),
            (Self::Sequence(items), PathSegment::Index(i)) => items.get_mut(*i),
            _ => None,
        })
    }

    /// Paths of every string leaf, in walk order.
    pub fn leaf_paths(&self) -> Vec<LeafPath> {
        let mut paths = Vec::new();
        collect_leaves(self, LeafPath::root(), &mut paths);
        paths
    }

    /// Decode the subtree into a typed struct.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}

fn collect_leaves(node: &ConfigValue, path: LeafPath, out: &mut Vec<LeafPath>) {
    match node {
        ConfigValue::String(_) => out.push(path),
        ConfigValue::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_leaves(item, path.child(PathSegment::Index(i)), out);
            }
        }
        ConfigValue::Mapping(entries) => {
            for (key, value) in entries {
                collect_leaves(value, path.child(PathSegment::Key(key.clone())), out);
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
