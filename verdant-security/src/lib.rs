//! Identity and role gating for the Verdant client.
//!
//! [`IdentityProvider`] owns the current principal and credential.
//! [`RoleResolver`] looks up the principal's role through the query cache,
//! but only once the identity has resolved to a principal with an email;
//! [`RoleTracker`] follows identity changes, and [`RoleGuard`] turns the
//! result into an access decision.

mod guards;
mod identity;
mod role;

pub use guards::{Access, RoleGuard};
pub use identity::{AuthState, IdentityProvider, Principal};
pub use role::{role_key, RoleQuery, RoleResolver, RoleTracker};

pub mod prelude {
    //! Re-exports of the most commonly used security types.
    pub use crate::{Access, AuthState, IdentityProvider, Principal, RoleGuard, RoleResolver};
}
