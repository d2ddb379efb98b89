use super::{env_name, ConfigError, VerdantConfig};

/// One setting a [`ConfigProperties`] section reads.
#[derive(Debug, Clone)]
pub struct PropertyMeta {
    /// Dotted key, e.g. `"api.url"`.
    pub key: &'static str,
    pub type_name: &'static str,
    pub required: bool,
    /// Rendered default, for help output.
    pub default_value: Option<&'static str>,
    pub description: &'static str,
}

impl PropertyMeta {
    pub fn env_var(&self) -> String {
        env_name(self.key)
    }
}

/// A strongly-typed view over part of a [`VerdantConfig`].
pub trait ConfigProperties: Sized {
    /// Leading key segment of the section, e.g. `"api"`.
    fn prefix() -> &'static str;

    fn properties_metadata() -> Vec<PropertyMeta>;

    fn from_config(config: &VerdantConfig) -> Result<Self, ConfigError>;
}
