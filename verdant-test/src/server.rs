use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use verdant_core::ClientConfig;

#[derive(Default)]
struct ServerState {
    plants: Mutex<Vec<Value>>,
    roles: Mutex<HashMap<String, String>>,
    token: Mutex<Option<String>>,
    upload_key: Mutex<Option<String>>,
    next_id: AtomicUsize,
    hits: Mutex<Vec<String>>,
}

impl ServerState {
    fn hit(&self, what: String) {
        self.hits.lock().unwrap().push(what);
    }
}

/// An in-process marketplace API on an ephemeral port.
///
/// Serves `/plants`, `/plants/{id}`, `/users/role/{email}` (bearer-protected
/// once a token is set) and an imgbb-style `/upload`. Aborted on drop.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let router = Router::new()
            .route("/plants", get(list_plants).post(create_plant))
            .route("/plants/{id}", get(get_plant))
            .route("/users/role/{email}", get(user_role))
            .route("/upload", post(upload))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(error = %err, "mock server stopped");
            }
        });
        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn upload_url(&self) -> String {
        format!("http://{}/upload", self.addr)
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.url().parse().expect("mock server URL"));
        config.upload.url = self.upload_url().parse().expect("mock upload URL");
        config
    }

    /// Add a plant record; `_id` is assigned when missing. Returns the id.
    pub fn insert_plant(&self, mut plant: Value) -> String {
        let id = match plant.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = format!("p{}", self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                plant["_id"] = json!(id);
                id
            }
        };
        self.state.plants.lock().unwrap().push(plant);
        id
    }

    pub fn plants(&self) -> Vec<Value> {
        self.state.plants.lock().unwrap().clone()
    }

    pub fn set_role(&self, email: &str, role: &str) {
        self.state.roles.lock().unwrap().insert(email.to_string(), role.to_string());
    }

    /// Require `Authorization: Bearer {token}` on role lookups.
    pub fn require_token(&self, token: &str) {
        *self.state.token.lock().unwrap() = Some(token.to_string());
    }

    /// Require `?key={key}` on uploads.
    pub fn require_upload_key(&self, key: &str) {
        *self.state.upload_key.lock().unwrap() = Some(key.to_string());
    }

    /// Requests served so far, as `METHOD path`.
    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
}

async fn list_plants(State(state): State<Arc<ServerState>>) -> Json<Vec<Value>> {
    state.hit("GET /plants".into());
    Json(state.plants.lock().unwrap().clone())
}

async fn get_plant(State(state): State<Arc<ServerState>>, Path(id): Path<String>) -> Response {
    state.hit(format!("GET /plants/{id}"));
    let plants = state.plants.lock().unwrap();
    match plants.iter().find(|p| p.get("_id").and_then(Value::as_str) == Some(id.as_str())) {
        Some(plant) => Json(plant.clone()).into_response(),
        None => not_found("Plant not found"),
    }
}

async fn create_plant(State(state): State<Arc<ServerState>>, Json(mut plant): Json<Value>) -> Response {
    state.hit("POST /plants".into());
    if !plant.is_object() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "message": "expected an object" }))).into_response();
    }
    let id = format!("p{}", state.next_id.fetch_add(1, Ordering::SeqCst) + 1);
    plant["_id"] = json!(id);
    state.plants.lock().unwrap().push(plant);
    Json(json!({ "acknowledged": true, "insertedId": id })).into_response()
}

async fn user_role(
    State(state): State<Arc<ServerState>>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.hit(format!("GET /users/role/{email}"));
    let expected = state.token.lock().unwrap().clone();
    if let Some(token) = expected {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(token.as_str()) {
            return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "unauthorized access" })))
                .into_response();
        }
    }
    match state.roles.lock().unwrap().get(&email) {
        Some(role) => Json(json!({ "role": role })).into_response(),
        None => not_found("User not found"),
    }
}

#[derive(Deserialize)]
struct UploadQuery {
    key: Option<String>,
}

async fn upload(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response {
    state.hit("POST /upload".into());
    let expected = state.upload_key.lock().unwrap().clone();
    if expected.is_some() && query.key != expected {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid API key" }))).into_response();
    }
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "empty upload" }))).into_response();
    }
    let n = state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "data": { "display_url": format!("https://i.ibb.co/mock/{n}.png") } })).into_response()
}
