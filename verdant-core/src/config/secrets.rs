use std::collections::HashMap;

use super::ConfigError;

/// Expands the `${...}` references found in YAML string values.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError>;
}

/// `${NAME}` and `${env:NAME}` read the process environment,
/// `${file:/run/secrets/api_token}` reads a file with surrounding whitespace trimmed.
pub struct DefaultSecretResolver;

impl SecretResolver for DefaultSecretResolver {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        match Reference::parse(reference) {
            Reference::File(path) => std::fs::read_to_string(path)
                .map(|content| content.trim().to_string())
                .map_err(|e| ConfigError::Load(format!("secret file '{path}': {e}"))),
            Reference::Var(name) => {
                std::env::var(name).map_err(|_| ConfigError::NotFound(name.to_string()))
            }
        }
    }
}

enum Reference<'a> {
    Var(&'a str),
    File(&'a str),
}

impl<'a> Reference<'a> {
    fn parse(raw: &'a str) -> Self {
        let raw = raw.trim();
        if let Some(path) = raw.strip_prefix("file:") {
            Reference::File(path.trim())
        } else {
            Reference::Var(raw.strip_prefix("env:").unwrap_or(raw).trim())
        }
    }
}

/// Variables from the loaded `.env` snapshot shadow whatever `fallback` would return.
pub(crate) struct Layered<'a> {
    env: &'a HashMap<String, String>,
    fallback: &'a dyn SecretResolver,
}

impl<'a> Layered<'a> {
    pub(crate) fn new(env: &'a HashMap<String, String>, fallback: &'a dyn SecretResolver) -> Self {
        Self { env, fallback }
    }
}

impl SecretResolver for Layered<'_> {
    fn resolve(&self, reference: &str) -> Result<String, ConfigError> {
        match Reference::parse(reference) {
            Reference::Var(name) if self.env.contains_key(name) => Ok(self.env[name].clone()),
            _ => self.fallback.resolve(reference),
        }
    }
}

/// Replace every `${...}` in `value` with what `resolver` returns for it.
pub fn resolve_placeholders(
    value: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(value.len());
    let mut pieces = value.split("${");
    out.push_str(pieces.next().unwrap_or_default());
    for piece in pieces {
        let (reference, tail) = piece
            .split_once('}')
            .ok_or_else(|| ConfigError::Load(format!("unclosed placeholder in '{value}'")))?;
        out.push_str(&resolver.resolve(reference)?);
        out.push_str(tail);
    }
    Ok(out)
}
