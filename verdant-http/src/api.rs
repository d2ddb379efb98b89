use std::sync::Arc;

use garde::Validate;
use serde::de::DeserializeOwned;
use verdant_core::{ClientError, MutationResult, NewPlant, Plant, Role, RoleResponse};

use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Typed endpoints of the marketplace API.
///
/// Payloads are validated before dispatch and responses are decoded into
/// their records; a response that does not match is a `Server` error.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// `GET /plants`
    pub async fn list_plants(&self) -> Result<Vec<Plant>, ClientError> {
        self.fetch(ApiRequest::get("plants")).await
    }

    /// `GET /plants/{id}`
    pub async fn get_plant(&self, id: &str) -> Result<Plant, ClientError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ClientError::invalid("id", "Plant id is required"));
        }
        self.fetch(ApiRequest::get("plants").segment(id)).await
    }

    /// `POST /plants`. A reply with `acknowledged: false` is a `Server` error.
    pub async fn create_plant(&self, plant: &NewPlant) -> Result<MutationResult, ClientError> {
        plant.validate()?;
        let body = serde_json::to_value(plant)
            .map_err(|e| ClientError::invalid("plant", format!("Unserializable payload: {e}")))?;
        let response = self.send(ApiRequest::post("plants", body)).await?;
        let result: MutationResult = response.json()?;
        if !result.is_acknowledged() {
            tracing::warn!(name = %plant.name, status = response.status, "plant write not acknowledged");
            return Err(ClientError::Server {
                status: response.status,
                message: "write not acknowledged".into(),
            });
        }
        tracing::info!(name = %plant.name, id = ?result.id(), "plant created");
        Ok(result)
    }

    /// `GET /users/role/{email}`, authenticated. An empty email is rejected
    /// without a request.
    pub async fn user_role(&self, email: &str) -> Result<Role, ClientError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::invalid("email", "Email is required"));
        }
        let response: RoleResponse = self
            .fetch(ApiRequest::get("users/role").segment(email).authenticated())
            .await?;
        Ok(Role::from(response.role))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        self.send(request).await?.json()
    }

    /// Send `request` and turn a non-2xx status into its error.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let path = request.path.clone();
        self.transport.send(request).await?.error_for_status().map_err(|e| {
            tracing::debug!(path = %path, error = %e, "request rejected");
            e
        })
    }
}
