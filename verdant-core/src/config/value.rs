use std::time::Duration;

use url::Url;

use super::ConfigError;

/// A leaf of the flattened configuration tree.
///
/// YAML scalars keep their type. Values read from the environment or a
/// `.env` file arrive as `String` and are parsed on access.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl ConfigValue {
    pub(crate) fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        Some(match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(*b),
            serde_yaml::Value::String(s) => ConfigValue::String(s.clone()),
            serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ConfigValue::Integer(i),
                (None, Some(f)) => ConfigValue::Float(f),
                (None, None) => ConfigValue::String(n.to_string()),
            },
            serde_yaml::Value::Tagged(tagged) => return ConfigValue::from_yaml(&tagged.value),
            serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => return None,
        })
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.trim()),
            _ => None,
        }
    }
}

/// Conversion from a [`ConfigValue`] into a typed setting.
///
/// `key` is only used to build error messages.
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::String(s) => Ok(s.clone()),
            ConfigValue::Integer(i) => Ok(i.to_string()),
            ConfigValue::Float(f) => Ok(f.to_string()),
            ConfigValue::Bool(b) => Ok(b.to_string()),
            ConfigValue::Null => Err(mismatch(key, "String")),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match (value, value.as_text().map(str::to_ascii_lowercase).as_deref()) {
            (ConfigValue::Bool(b), _) => Ok(*b),
            (_, Some("true" | "yes" | "on" | "1")) => Ok(true),
            (_, Some("false" | "no" | "off" | "0")) => Ok(false),
            _ => Err(mismatch(key, "bool")),
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            other => other
                .as_text()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| mismatch(key, "f64")),
        }
    }
}

macro_rules! unsigned_config_value {
    ($($ty:ty),*) => {$(
        impl FromConfigValue for $ty {
            fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
                let parsed = match value {
                    ConfigValue::Integer(i) => <$ty>::try_from(*i).ok(),
                    other => other.as_text().and_then(|s| s.parse().ok()),
                };
                parsed.ok_or_else(|| mismatch(key, stringify!($ty)))
            }
        }
    )*};
}

unsigned_config_value!(u16, u32, u64, usize);

/// Durations are configured in milliseconds (`timeout_ms: 2500`).
impl FromConfigValue for Duration {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        u64::from_config_value(value, key)
            .map(Duration::from_millis)
            .map_err(|_| mismatch(key, "milliseconds"))
    }
}

/// Only absolute URLs that can serve as a base for request paths.
impl FromConfigValue for Url {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let raw = value.as_text().ok_or_else(|| mismatch(key, "Url"))?;
        let invalid = |message: String| ConfigError::Invalid {
            key: key.to_string(),
            message,
        };
        let url = Url::parse(raw).map_err(|e| invalid(format!("'{raw}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(invalid(format!("'{raw}' is not a base URL")));
        }
        Ok(url)
    }
}

/// `null` and blank strings read as `None`.
impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Null => Ok(None),
            ConfigValue::String(s) if s.trim().is_empty() => Ok(None),
            other => T::from_config_value(other, key).map(Some),
        }
    }
}
