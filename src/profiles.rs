//! Profile-aware fragment naming and loading.
//!
//! For base names `[app]` and active profiles `dev,local` the fragments are
//! `app.yml`, `app-local.yml`, `app-dev.yml`, lowest precedence first, so the
//! first declared profile wins.

use crate::errors::{ConfigError, Result};
use crate::tree::{Fragment, Value};
use layerconf_secrets::Environment;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

const FRAGMENT_EXTENSION: &str = "yml";

/// Profiles named by `var`: comma separated, trimmed, empties dropped.
pub fn active_profiles(env: &dyn Environment, var: &str) -> Vec<String> {
    env.var(var)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Fragment names in precedence order: every base name, then each base
/// name's profile variants with the profiles reversed.
pub fn fragment_names(prop_names: &[&str], profiles: &[String]) -> Vec<String> {
    let mut names: Vec<String> = prop_names.iter().map(|n| n.to_string()).collect();
    for name in prop_names {
        names.extend(profiles.iter().rev().map(|profile| format!("{}-{}", name, profile)));
    }
    names
}

/// Parse one YAML document. An empty document is an empty fragment.
pub fn parse_fragment(text: &str) -> Result<Fragment> {
    let raw: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| ConfigError::fragment(format!("invalid YAML: {}", e)))?;
    match Value::from_yaml(raw)? {
        Value::Null => Ok(Fragment::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ConfigError::fragment("top level of a fragment must be a mapping")),
    }
}

/// Read `<dir>/<name>.yml` for each name. Missing files load as empty
/// fragments; unreadable or invalid ones are errors.
pub async fn load_fragments(dir: &Path, names: &[String]) -> Result<Vec<Fragment>> {
    let mut fragments = Vec::with_capacity(names.len());
    for name in names {
        let path = dir.join(format!("{}.{}", name, FRAGMENT_EXTENSION));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let fragment = parse_fragment(&text).map_err(|e| match e {
                    ConfigError::Fragment { message } => {
                        ConfigError::fragment(format!("{}: {}", path.display(), message))
                    }
                    other => other,
                })?;
                info!(file = %path.display(), "Loaded configuration fragment");
                fragments.push(fragment);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(file = %path.display(), "Configuration fragment not present");
                fragments.push(Fragment::new());
            }
            Err(e) => {
                return Err(ConfigError::io(e, format!("reading {}", path.display())));
            }
        }
    }
    Ok(fragments)
}

/// Build an environment from `KEY=VALUE` pairs, splitting on the first `=`.
/// Pairs without `=` are ignored.
pub fn env_from_pairs<I, S>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pairs
        .into_iter()
        .filter_map(|pair| {
            pair.as_ref().split_once('=').map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_profiles() {
        let env = env_from_pairs(["SPRING_PROFILES_ACTIVE= dev, ,local "]);
        assert_eq!(active_profiles(&env, "SPRING_PROFILES_ACTIVE"), vec!["dev", "local"]);
        assert!(active_profiles(&env, "OTHER").is_empty());
    }

    #[test]
    fn test_fragment_names_order() {
        let profiles = vec!["dev".to_string(), "local".to_string()];
        assert_eq!(
            fragment_names(&["app", "shared"], &profiles),
            vec!["app", "shared", "app-local", "app-dev", "shared-local", "shared-dev"]
        );
        assert_eq!(fragment_names(&["app"], &[]), vec!["app"]);
    }

    #[test]
    fn test_env_from_pairs_splits_on_first_equals() {
        let env = env_from_pairs(["URL=http://x?a=b", "EMPTY=", "bogus"]);
        assert_eq!(env.get("URL").map(String::as_str), Some("http://x?a=b"));
        assert_eq!(env.get("EMPTY").map(String::as_str), Some(""));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_parse_fragment() {
        assert!(parse_fragment("").unwrap().is_empty());
        assert!(parse_fragment("# only a comment\n").unwrap().is_empty());
        assert_eq!(parse_fragment("a: 1").unwrap().get("a"), Some(&Value::Integer(1)));
        assert!(matches!(parse_fragment("- a\n- b\n"), Err(ConfigError::Fragment { .. })));
        assert!(matches!(parse_fragment("a: [unclosed"), Err(ConfigError::Fragment { .. })));
    }

    #[tokio::test]
    async fn test_load_fragments_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.yml"), "a: base\n").unwrap();
        std::fs::write(dir.path().join("app-dev.yml"), "a: dev\n").unwrap();

        let names = vec!["app".to_string(), "app-local".to_string(), "app-dev".to_string()];
        let fragments = load_fragments(dir.path(), &names).await.unwrap();
        assert_eq!(fragments.len(), 3);
        assert!(fragments[1].is_empty());
        assert_eq!(fragments[2].get("a"), Some(&Value::String("dev".into())));
    }

    #[tokio::test]
    async fn test_load_fragments_reports_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.yml"), "a: [\n").unwrap();
        let err = load_fragments(dir.path(), &["app".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("app.yml"));
    }
}
