use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use verdant_core::Seller;
use verdant_http::CredentialProvider;

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            photo_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }
}

impl From<&Principal> for Seller {
    fn from(principal: &Principal) -> Self {
        Seller {
            name: principal.display_name.clone(),
            email: principal.email.clone(),
            image: principal.photo_url.clone(),
        }
    }
}

/// What the identity provider currently knows: a principal (or none) and
/// whether it is still resolving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub principal: Option<Principal>,
    pub loading: bool,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            principal: None,
            loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            loading: false,
        }
    }

    /// The principal's email, if there is a principal and its email is non-empty.
    pub fn email(&self) -> Option<&str> {
        self.principal
            .as_ref()
            .map(|p| p.email.trim())
            .filter(|email| !email.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        !self.loading && self.principal.is_some()
    }
}

struct ProviderInner {
    state: watch::Sender<AuthState>,
    token: RwLock<Option<String>>,
}

/// Owner of the current [`AuthState`] and of the bearer credential attached
/// to protected requests.
///
/// Starts out loading. `IdentityProvider` is a cheap `Clone` handle; readers
/// follow changes through [`watch`](Self::watch).
#[derive(Clone)]
pub struct IdentityProvider {
    inner: Arc<ProviderInner>,
}

impl Default for IdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AuthState::loading());
        Self {
            inner: Arc::new(ProviderInner {
                state,
                token: RwLock::new(None),
            }),
        }
    }

    pub fn sign_in(&self, principal: Principal, token: Option<String>) {
        tracing::info!(email = %principal.email, "principal signed in");
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        self.inner.state.send_replace(AuthState::signed_in(principal));
    }

    pub fn sign_out(&self) {
        tracing::info!("principal signed out");
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.inner.state.send_replace(AuthState::anonymous());
    }

    /// Mark the identity as resolving again (e.g. while a session is restored).
    pub fn begin_loading(&self) {
        self.inner.state.send_modify(|state| state.loading = true);
    }

    /// Replace the credential without touching the principal.
    pub fn set_token(&self, token: Option<String>) {
        *self.inner.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn current(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }
}

impl CredentialProvider for IdentityProvider {
    fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
