//! Dotted-key lookup of string leaves.

use super::value::ConfigValue;
use thiserror::Error;

/// Why a dotted key did not lead to a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("key '{key}' not found")]
    NotFound { key: String },

    /// A segment other than the last landed on a non-mapping.
    #[error("key '{key}' passes through a non-mapping value at '{segment}'")]
    InvalidIntermediate { key: String, segment: String },

    /// The key names a mapping or sequence.
    #[error("key '{key}' does not name a string value")]
    InvalidLeaf { key: String },
}

/// Look up `flat_key` (`a.b.c`) in `root`; only string leaves satisfy it.
pub fn value_from_flat_key<'a>(root: &'a ConfigValue, flat_key: &str) -> Result<&'a str, LookupError> {
    let not_found = || LookupError::NotFound { key: flat_key.to_string() };
    if flat_key.is_empty() {
        return Err(not_found());
    }

    let mut node = root;
    for segment in flat_key.split('.') {
        let mapping = match node {
            ConfigValue::Mapping(mapping) => mapping,
            _ => {
                return Err(LookupError::InvalidIntermediate {
                    key: flat_key.to_string(),
                    segment: segment.to_string(),
                })
            }
        };
        node = mapping.get(segment).ok_or_else(not_found)?;
    }

    node.as_str().ok_or_else(|| LookupError::InvalidLeaf { key: flat_key.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Value;

    fn tree(yaml: &str) -> ConfigValue {
        Value::from_yaml(serde_yaml::from_str(yaml).unwrap()).unwrap().normalize()
    }

    #[test]
    fn test_nested_string() {
        let root = tree("mock: {flat: {otherkey: {value: V}}}");
        assert_eq!(value_from_flat_key(&root, "mock.flat.otherkey.value"), Ok("V"));
    }

    #[test]
    fn test_not_found() {
        let root = tree("a: {b: c}");
        assert!(matches!(value_from_flat_key(&root, "a.x"), Err(LookupError::NotFound { .. })));
        assert!(matches!(value_from_flat_key(&root, ""), Err(LookupError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_intermediate() {
        let root = tree("a: {b: c}");
        assert_eq!(
            value_from_flat_key(&root, "a.b.c"),
            Err(LookupError::InvalidIntermediate { key: "a.b.c".into(), segment: "c".into() })
        );
    }

    #[test]
    fn test_invalid_leaf() {
        let root = tree("a: {b: {c: d}, list: [1]}");
        assert!(matches!(value_from_flat_key(&root, "a.b"), Err(LookupError::InvalidLeaf { .. })));
        assert!(matches!(value_from_flat_key(&root, "a.list"), Err(LookupError::InvalidLeaf { .. })));
    }

    #[test]
    fn test_normalized_scalars_are_found() {
        let root = tree("port: 8080\ndebug: true");
        assert_eq!(value_from_flat_key(&root, "port"), Ok("8080"));
        assert_eq!(value_from_flat_key(&root, "debug"), Ok("true"));
    }
}
