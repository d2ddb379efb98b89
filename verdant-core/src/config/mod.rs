mod client;
mod loader;
pub mod secrets;
pub mod typed;
pub mod validation;
pub mod value;

use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;

pub use client::{ClientConfig, RetrySettings, UploadSettings, DEFAULT_UPLOAD_URL};
pub use secrets::{DefaultSecretResolver, SecretResolver};
pub use typed::{ConfigProperties, PropertyMeta};
pub use validation::{validate_section, ConfigValidationError, MissingKeyError};
pub use value::{ConfigValue, FromConfigValue};

#[derive(Debug, Clone)]
pub enum ConfigError {
    NotFound(String),
    TypeMismatch { key: String, expected: &'static str },
    /// A config file or placeholder could not be read.
    Load(String),
    /// A value was present but rejected (e.g. a relative URL).
    Invalid { key: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "missing config key '{key}'"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "config key '{key}' is not a valid {expected}")
            }
            ConfigError::Load(msg) => write!(f, "failed to load configuration: {msg}"),
            ConfigError::Invalid { key, message } => write!(f, "config key '{key}': {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Environment variable that overrides a dotted key: `upload.api_key` -> `UPLOAD_API_KEY`.
pub fn env_name(key: &str) -> String {
    key.replace('.', "_").to_ascii_uppercase()
}

/// Layered client configuration.
///
/// Lookups of `api.url` consult, from highest priority down:
///
/// 1. the process environment (`API_URL`)
/// 2. `.env.{profile}`
/// 3. `.env`
/// 4. `application-{profile}.yaml`
/// 5. `application.yaml`
///
/// `.env` files are read into a snapshot taken at load time; the process
/// environment is never modified. The active profile is `VERDANT_PROFILE`
/// when set, otherwise the one passed to [`load_from_dir`](Self::load_from_dir).
///
/// `VerdantConfig<T>` additionally carries a typed section reachable via `Deref`.
#[derive(Debug, Clone)]
pub struct VerdantConfig<T = ()> {
    values: HashMap<String, ConfigValue>,
    env: HashMap<String, String>,
    profile: String,
    typed: T,
}

impl VerdantConfig {
    pub fn load_from_dir(
        dir: &Path,
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let profile = std::env::var("VERDANT_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        loader::merge_yaml_file(&dir.join("application.yaml"), &mut values)?;
        loader::merge_yaml_file(&dir.join(format!("application-{profile}.yaml")), &mut values)?;

        let mut env = HashMap::new();
        loader::merge_dotenv(&dir.join(".env"), &mut env)?;
        loader::merge_dotenv(&dir.join(format!(".env.{profile}")), &mut env)?;
        env.extend(std::env::vars());

        let resolver = secrets::Layered::new(&env, resolver);
        for (key, value) in values.iter_mut() {
            if let ConfigValue::String(raw) = value {
                if raw.contains("${") {
                    *raw = secrets::resolve_placeholders(raw, &resolver)
                        .map_err(|e| ConfigError::Load(format!("{key}: {e}")))?;
                }
            }
        }

        tracing::debug!(%profile, keys = values.len(), "configuration loaded");
        Ok(VerdantConfig {
            values,
            env,
            profile,
            typed: (),
        })
    }

    /// [`load_from_dir`](Self::load_from_dir) on the working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile, &DefaultSecretResolver)
    }

    /// A config built from a single YAML document with no environment layer.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::merge_yaml(yaml, &mut values)?;
        Ok(VerdantConfig {
            values,
            env: HashMap::new(),
            profile: profile.to_string(),
            typed: (),
        })
    }

    pub fn empty() -> Self {
        VerdantConfig {
            values: HashMap::new(),
            env: HashMap::new(),
            profile: "test".to_string(),
            typed: (),
        }
    }

    /// Pin `key` to `value`, overriding every layer including the environment.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.env.remove(&env_name(key));
        self.values.insert(key.to_string(), value);
    }

    /// Build the typed section `C` and carry it alongside the raw values.
    pub fn with_typed<C: ConfigProperties>(self) -> Result<VerdantConfig<C>, ConfigError> {
        let typed = C::from_config(&self)?;
        Ok(VerdantConfig {
            values: self.values,
            env: self.env,
            profile: self.profile,
            typed,
        })
    }
}

impl<T> VerdantConfig<T> {
    fn lookup(&self, key: &str) -> Option<ConfigValue> {
        match self.env.get(&env_name(key)) {
            Some(raw) => Some(ConfigValue::String(raw.clone())),
            None => self.values.get(key).cloned(),
        }
    }

    /// # Errors
    ///
    /// `NotFound` when no layer defines `key`, `TypeMismatch` or `Invalid`
    /// when the value does not convert to `V`.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(&value, key)
    }

    /// Like [`get`](Self::get) but falls back to `default` when `key` is absent.
    /// A present but unconvertible value is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.get(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.env.contains_key(&env_name(key))
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn typed(&self) -> &T {
        &self.typed
    }
}

impl<T> Deref for VerdantConfig<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.typed
    }
}
