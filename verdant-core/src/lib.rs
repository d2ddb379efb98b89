pub mod config;
pub mod error;
pub mod key;
pub mod logging;
pub mod model;

pub use config::{
    ClientConfig, ConfigError, ConfigProperties, ConfigValue, DefaultSecretResolver,
    FromConfigValue, SecretResolver, VerdantConfig, validate_section,
};
pub use error::{ClientError, FieldError};
pub use key::{KeySegment, ResourceKey};
pub use logging::init_tracing;
pub use model::{
    MutationResult, NewPlant, Plant, PlantDraft, PlantForm, Role, RoleResponse, Seller,
    PLANT_CATEGORIES,
};

/// Result alias used across the Verdant crates.
pub type ClientResult<T> = Result<T, ClientError>;

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{key, ClientConfig, ClientError, ClientResult, Plant, ResourceKey, Role};
}
