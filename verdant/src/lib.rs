//! Verdant: the data-access layer of a plant marketplace.
//!
//! This facade re-exports every Verdant sub-crate and adds [`Marketplace`],
//! the application context wiring them together:
//!
//! ```ignore
//! use verdant::prelude::*;
//!
//! let market = Marketplace::connect(ClientConfig::new(url)).await?;
//! let mut plants = market.plants();
//! let state = plants.settled().await;
//! ```

pub use verdant_cache;
pub use verdant_core;
pub use verdant_events;
pub use verdant_http;
pub use verdant_security;

// Core types at the top level.
pub use verdant_core::*;

mod add_plant;
mod market;

pub use add_plant::{AddPlantFlow, PLANT_ADDED, PLANT_ADD_FAILED};
pub use market::Marketplace;

pub mod prelude {
    //! Everything needed to drive a [`Marketplace`](crate::Marketplace).
    pub use crate::{AddPlantFlow, Marketplace};
    pub use verdant_cache::prelude::*;
    pub use verdant_core::prelude::*;
    pub use verdant_core::{PlantForm, Seller};
    pub use verdant_events::prelude::*;
    pub use verdant_http::prelude::*;
    pub use verdant_security::prelude::*;
}
