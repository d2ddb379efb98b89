use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

pub(crate) type Values = HashMap<String, ConfigValue>;

/// Merge a YAML file over `values`. A missing file contributes nothing.
pub(crate) fn merge_yaml_file(path: &Path, values: &mut Values) -> Result<(), ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => merge_yaml(&content, values)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ConfigError::Load(format!("{}: {e}", path.display()))),
    }
}

pub(crate) fn merge_yaml(content: &str, values: &mut Values) -> Result<(), ConfigError> {
    let root: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    let mut stack = vec![(String::new(), &root)];
    while let Some((path, node)) = stack.pop() {
        match node {
            serde_yaml::Value::Mapping(map) => {
                for (segment, child) in map {
                    let Some(segment) = segment_name(segment) else {
                        continue;
                    };
                    stack.push((join(&path, &segment), child));
                }
            }
            // `hosts: [a, b]` becomes `hosts.0`, `hosts.1`
            serde_yaml::Value::Sequence(items) => {
                for (i, child) in items.iter().enumerate() {
                    stack.push((join(&path, &i.to_string()), child));
                }
            }
            leaf if !path.is_empty() => {
                if let Some(value) = ConfigValue::from_yaml(leaf) {
                    values.insert(path, value);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn segment_name(key: &serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Read a `.env` file into `env` without touching the process environment.
/// Later files override earlier ones; a missing file contributes nothing.
pub(crate) fn merge_dotenv(path: &Path, env: &mut HashMap<String, String>) -> Result<(), ConfigError> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(ConfigError::Load(format!("{}: {e}", path.display()))),
    };
    for entry in entries {
        let (name, value) =
            entry.map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        env.insert(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_maps_and_lists_flatten_to_dotted_keys() {
        let mut values = Values::new();
        merge_yaml("api:\n  url: http://x\ncache:\n  retry:\n    max: 2\nhosts: [a, b]\n", &mut values)
            .unwrap();

        assert_eq!(values["api.url"], ConfigValue::String("http://x".into()));
        assert_eq!(values["cache.retry.max"], ConfigValue::Integer(2));
        assert_eq!(values["hosts.1"], ConfigValue::String("b".into()));
    }

    #[test]
    fn later_yaml_overrides_earlier() {
        let mut values = Values::new();
        merge_yaml("api:\n  timeout_ms: 1000\n  url: http://x\n", &mut values).unwrap();
        merge_yaml("api:\n  timeout_ms: 2000\n", &mut values).unwrap();

        assert_eq!(values["api.timeout_ms"], ConfigValue::Integer(2000));
        assert_eq!(values["api.url"], ConfigValue::String("http://x".into()));
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut values = Values::new();
        let mut env = HashMap::new();
        merge_yaml_file(&dir.path().join("application.yaml"), &mut values).unwrap();
        merge_dotenv(&dir.path().join(".env"), &mut env).unwrap();
        assert!(values.is_empty() && env.is_empty());
    }
}
