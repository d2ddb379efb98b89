//! Command implementations for the `verdant` CLI.
//!
//! Each submodule corresponds to a top-level CLI command. Every command
//! talks to the API through a [`Marketplace`] built by [`connect`].

use std::error::Error;
use std::path::PathBuf;

use verdant::{
    validate_section, ClientConfig, ClientError, ConfigValue, DefaultSecretResolver, Marketplace,
    VerdantConfig,
};
use verdant::verdant_cache::{FetchState, QueryState};

/// Plant listings: `verdant plants list|show|add`.
pub mod plants;

/// Role lookup: `verdant role <email>`.
pub mod role;

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Where the configuration comes from, plus command-line overrides.
#[derive(Debug, Clone)]
pub struct Connection {
    pub profile: String,
    pub config_dir: PathBuf,
    pub api_url: Option<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            profile: "dev".into(),
            config_dir: PathBuf::from("."),
            api_url: None,
        }
    }
}

/// Load and validate the `api.*` section for this connection.
pub fn load_config(connection: &Connection) -> Result<ClientConfig, Box<dyn Error>> {
    let mut raw =
        VerdantConfig::load_from_dir(&connection.config_dir, &connection.profile, &DefaultSecretResolver)?;
    if let Some(url) = &connection.api_url {
        raw.set("api.url", ConfigValue::String(url.clone()));
    }
    validate_section::<ClientConfig>(&raw)?;
    let config = raw.with_typed::<ClientConfig>()?;
    tracing::debug!(profile = config.profile(), api = %config.api_url, "configuration loaded");
    Ok(config.typed().clone())
}

pub async fn connect(connection: &Connection) -> Result<Marketplace, Box<dyn Error>> {
    let config = load_config(connection)?;
    Ok(Marketplace::connect(config).await?)
}

/// The value of a settled query, or the error it failed with.
pub(crate) fn into_result<V>(state: QueryState<V>) -> Result<std::sync::Arc<V>, ClientError> {
    match state.fetch_state() {
        FetchState::Success(value) => Ok(value),
        FetchState::Failure(err) => Err(err),
        FetchState::Idle | FetchState::Pending => {
            Err(ClientError::Transport("request did not complete".into()))
        }
    }
}
