use std::sync::Arc;

use verdant_cache::{CacheOptions, QueryCache, QueryFailed, Subscription};
use verdant_core::{key, ClientConfig, ClientError, Plant, ResourceKey};
use verdant_events::{EventBus, NotificationLog};
use verdant_http::{ApiClient, HostedImageUploader, HttpTransport, ImageUploader, Transport};
use verdant_security::{role_key, IdentityProvider, RoleQuery, RoleResolver, RoleTracker};

use crate::add_plant::AddPlantFlow;

/// The application context: one cache, one identity, one API client.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct Marketplace {
    config: Arc<ClientConfig>,
    identity: IdentityProvider,
    api: ApiClient,
    cache: QueryCache,
    events: EventBus,
    uploader: Arc<dyn ImageUploader>,
    roles: RoleResolver,
}

impl Marketplace {
    /// Build a context talking to `config.api_url` over HTTP, with the
    /// identity provider supplying the bearer credential.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let identity = IdentityProvider::new();
        identity.set_token(config.api_token.clone());
        let transport = HttpTransport::new(&config)?.with_credentials(Arc::new(identity.clone()));
        let uploader = HostedImageUploader::new(&config.upload, config.timeout)?;
        Ok(Self::new(config, Arc::new(transport), Arc::new(uploader), identity).await)
    }

    /// Assemble a context from explicit parts.
    pub async fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        uploader: Arc<dyn ImageUploader>,
        identity: IdentityProvider,
    ) -> Self {
        let events = EventBus::new();
        let cache = QueryCache::with_events(CacheOptions::from_config(&config), events.clone());
        let api = ApiClient::new(transport);
        let roles = RoleResolver::new(cache.clone(), api.clone());

        let market = Self {
            config: Arc::new(config),
            identity,
            api,
            cache,
            events,
            uploader,
            roles,
        };
        market.watch_auth_failures().await;
        tracing::debug!(api = %market.config.api_url, "marketplace ready");
        market
    }

    /// Credentials rejected on any read invalidate the current principal's role.
    async fn watch_auth_failures(&self) {
        let identity = self.identity.clone();
        let roles = self.roles.clone();
        self.events
            .subscribe(move |event: Arc<QueryFailed>| {
                let identity = identity.clone();
                let roles = roles.clone();
                async move {
                    if !event.error.is_auth() {
                        return;
                    }
                    let auth = identity.current();
                    if let Some(email) = auth.email() {
                        // The role entry clears its own data on an auth failure.
                        if event.key != role_key(email) {
                            tracing::warn!(key = %event.key, email, "credentials rejected, invalidating cached role");
                            roles.invalidate(email);
                        }
                    }
                }
            })
            .await;
    }

    /// `("plants",)`: every listing.
    pub fn plants(&self) -> Subscription<Vec<Plant>> {
        let api = self.api.clone();
        self.cache.subscribe(ResourceKey::new("plants"), move || {
            let api = api.clone();
            async move { api.list_plants().await }
        })
    }

    /// `("plants", id)`: one listing.
    pub fn plant(&self, id: &str) -> Subscription<Plant> {
        let api = self.api.clone();
        let owned = id.to_string();
        self.cache.subscribe(key!("plants", id), move || {
            let api = api.clone();
            let id = owned.clone();
            async move { api.get_plant(&id).await }
        })
    }

    /// The current principal's role lookup, gated on the identity.
    pub fn role(&self) -> RoleQuery {
        self.roles.resolve(&self.identity.current())
    }

    pub fn role_tracker(&self) -> RoleTracker {
        RoleTracker::new(self.roles.clone(), &self.identity)
    }

    pub fn add_plant_flow(&self) -> AddPlantFlow {
        AddPlantFlow::new(
            self.api.clone(),
            self.cache.clone(),
            self.uploader.clone(),
            self.identity.clone(),
            self.events.clone(),
        )
    }

    /// The application regained focus: refetch every stale entry in use.
    pub fn focus(&self) -> usize {
        self.cache.refetch_active()
    }

    /// Start recording user notifications.
    pub async fn notifications(&self) -> NotificationLog {
        NotificationLog::attach(&self.events).await
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn roles(&self) -> &RoleResolver {
        &self.roles
    }
}
