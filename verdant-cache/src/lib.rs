//! Keyed fetch coordination for the Verdant client.
//!
//! [`QueryCache`] owns one shared state per [`ResourceKey`](verdant_core::ResourceKey):
//! concurrent subscribers to a key share a single in-flight request, cached
//! values are served immediately and revalidated once stale, and responses
//! from superseded requests are dropped. [`Mutation`] covers writes.

mod mutation;
mod query;
mod retry;
mod state;
mod subscription;

pub use mutation::Mutation;
pub use query::{CacheOptions, QueryCache, QueryFailed};
pub use retry::RetryPolicy;
pub use state::{FetchState, FetchStatus, MutationState, QueryState};
pub use subscription::Subscription;

pub mod prelude {
    //! Re-exports of the most commonly used cache types.
    pub use crate::{CacheOptions, FetchState, FetchStatus, Mutation, QueryCache, Subscription};
}
