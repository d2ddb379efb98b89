use std::future::pending;

use tokio::sync::watch;
use verdant_cache::{QueryCache, Subscription};
use verdant_core::{key, ClientError, ResourceKey, Role};
use verdant_http::ApiClient;

use crate::identity::{AuthState, IdentityProvider};

/// Cache key of a principal's role.
pub fn role_key(email: &str) -> ResourceKey {
    key!("role", email)
}

/// Resolves the role of the current principal through the query cache.
///
/// The lookup stays disabled (no request is ever built) while the identity
/// provider is loading or the principal has no email.
#[derive(Clone)]
pub struct RoleResolver {
    cache: QueryCache,
    api: ApiClient,
}

impl RoleResolver {
    pub fn new(cache: QueryCache, api: ApiClient) -> Self {
        Self { cache, api }
    }

    pub fn resolve(&self, auth: &AuthState) -> RoleQuery {
        if auth.loading {
            return RoleQuery::Disabled { loading: true };
        }
        let Some(email) = auth.email() else {
            return RoleQuery::Disabled { loading: false };
        };

        let api = self.api.clone();
        let owned = email.to_string();
        let subscription = self.cache.subscribe(role_key(email), move || {
            let api = api.clone();
            let email = owned.clone();
            async move { api.user_role(&email).await }
        });
        RoleQuery::Active(subscription)
    }

    /// Forget the cached role of `email`, e.g. after its credentials were
    /// rejected. Live lookups lose the old role at once and fetch it again;
    /// an unused entry is dropped.
    pub fn invalidate(&self, email: &str) -> bool {
        let known = self.cache.purge(&role_key(email));
        if known {
            tracing::debug!(email, "cached role invalidated");
        }
        known
    }
}

/// The role lookup for one identity snapshot.
#[derive(Debug)]
pub enum RoleQuery {
    /// Gate closed. `loading` is set while the identity is still resolving.
    Disabled { loading: bool },
    Active(Subscription<Role>),
}

impl RoleQuery {
    pub fn is_enabled(&self) -> bool {
        matches!(self, RoleQuery::Active(_))
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            RoleQuery::Disabled { .. } => None,
            RoleQuery::Active(sub) => sub.data().map(|role| (*role).clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        match self {
            RoleQuery::Disabled { loading } => *loading,
            RoleQuery::Active(sub) => sub.is_loading(),
        }
    }

    /// `(role, is_loading)`
    pub fn pair(&self) -> (Option<Role>, bool) {
        (self.role(), self.is_loading())
    }

    pub fn error(&self) -> Option<ClientError> {
        match self {
            RoleQuery::Disabled { .. } => None,
            RoleQuery::Active(sub) => sub.error(),
        }
    }

    pub fn key(&self) -> Option<&ResourceKey> {
        match self {
            RoleQuery::Disabled { .. } => None,
            RoleQuery::Active(sub) => Some(sub.key()),
        }
    }

    /// Wait for the lookup to finish. Returns immediately when disabled.
    pub async fn settled(&mut self) -> Option<Role> {
        if let RoleQuery::Active(sub) = self {
            sub.settled().await;
        }
        self.role()
    }

    /// Resolves on the next state change; never resolves while disabled.
    async fn changed(&mut self) {
        if let RoleQuery::Active(sub) = self {
            if sub.changed().await {
                return;
            }
        }
        pending::<()>().await
    }
}

/// Keeps a [`RoleQuery`] in step with the identity provider.
///
/// A new lookup is started whenever the gating inputs change (loading flag
/// or email); the previous key's subscription is released. A sign-in that
/// keeps the email retries a lookup that failed or lost its value.
pub struct RoleTracker {
    resolver: RoleResolver,
    identity: watch::Receiver<AuthState>,
    auth: AuthState,
    query: RoleQuery,
}

enum Change {
    Identity,
    Role,
    Closed,
}

impl RoleTracker {
    pub fn new(resolver: RoleResolver, provider: &IdentityProvider) -> Self {
        let mut identity = provider.watch();
        let auth = identity.borrow_and_update().clone();
        let query = resolver.resolve(&auth);
        Self {
            resolver,
            identity,
            auth,
            query,
        }
    }

    pub fn current(&self) -> &RoleQuery {
        &self.query
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn pair(&self) -> (Option<Role>, bool) {
        self.query.pair()
    }

    /// Wait for the identity or the role state to change. Returns `false`
    /// once the identity provider is gone.
    pub async fn changed(&mut self) -> bool {
        let change = tokio::select! {
            biased;
            res = self.identity.changed() => if res.is_ok() { Change::Identity } else { Change::Closed },
            _ = self.query.changed() => Change::Role,
        };
        match change {
            Change::Closed => false,
            Change::Role => true,
            Change::Identity => {
                self.apply_identity();
                true
            }
        }
    }

    /// Wait until the role is known (or the gate is closed and the identity
    /// has finished loading).
    pub async fn settled(&mut self) -> (Option<Role>, bool) {
        if self.identity.has_changed().unwrap_or(false) {
            self.apply_identity();
        }
        while self.query.is_loading() {
            if !self.changed().await {
                break;
            }
        }
        self.query.pair()
    }

    fn apply_identity(&mut self) {
        let auth = self.identity.borrow_and_update().clone();
        let gate_moved = auth.loading != self.auth.loading || auth.email() != self.auth.email();
        if gate_moved {
            tracing::debug!(email = ?auth.email(), loading = auth.loading, "identity changed, re-resolving role");
            self.query = self.resolver.resolve(&auth);
        } else if let RoleQuery::Active(sub) = &self.query {
            let unresolved = sub.is_error() || (sub.data().is_none() && !sub.is_fetching());
            // A detached entry cannot be refetched; subscribe to the key again.
            if unresolved && !sub.refetch() {
                self.query = self.resolver.resolve(&auth);
            }
        }
        self.auth = auth;
    }
}
