use super::typed::ConfigProperties;
use super::{env_name, ConfigError, VerdantConfig};

/// A config key that is absent or unusable.
#[derive(Debug)]
pub struct MissingKeyError {
    pub key: String,
    pub expected_type: String,
    /// Environment variable that would supply the key.
    pub env_hint: String,
    pub description: Option<String>,
}

impl MissingKeyError {
    fn from_config_error(prefix: &str, err: ConfigError) -> Self {
        let (key, expected_type, description) = match err {
            ConfigError::NotFound(key) => (key, "value".to_string(), None),
            ConfigError::TypeMismatch { key, expected } => {
                (key, expected.to_string(), Some(format!("expected {expected}")))
            }
            ConfigError::Invalid { key, message } => (key, "valid value".to_string(), Some(message)),
            ConfigError::Load(message) => (prefix.to_string(), "loadable".to_string(), Some(message)),
        };
        Self {
            env_hint: env_name(&key),
            key,
            expected_type,
            description,
        }
    }
}

impl std::fmt::Display for MissingKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {} <{}> (env {})", self.key, self.expected_type, self.env_hint)?;
        match &self.description {
            Some(description) => write!(f, ": {description}"),
            None => Ok(()),
        }
    }
}

/// Every problem found while checking one config section.
#[derive(Debug)]
pub struct ConfigValidationError {
    pub errors: Vec<MissingKeyError>,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration ({} problem(s)):", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationError {}

/// Report every required key of `C` that no layer defines. If all are present,
/// build `C` once so that the first unconvertible value is reported as well.
pub fn validate_section<C: ConfigProperties>(config: &VerdantConfig) -> Result<(), ConfigValidationError> {
    let missing: Vec<MissingKeyError> = C::properties_metadata()
        .into_iter()
        .filter(|prop| prop.required && !config.contains_key(prop.key))
        .map(|prop| MissingKeyError {
            key: prop.key.to_string(),
            expected_type: prop.type_name.to_string(),
            env_hint: prop.env_var(),
            description: Some(prop.description.to_string()),
        })
        .collect();
    if !missing.is_empty() {
        return Err(ConfigValidationError { errors: missing });
    }

    C::from_config(config).map(drop).map_err(|err| ConfigValidationError {
        errors: vec![MissingKeyError::from_config_error(C::prefix(), err)],
    })
}
