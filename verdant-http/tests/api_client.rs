use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use verdant_core::config::UploadSettings;
use verdant_core::{ClientError, NewPlant, Role, Seller};
use verdant_http::{
    ApiClient, ApiRequest, ApiResponse, HostedImageUploader, ImageFile, ImageUploader, Method,
    Transport, TransportFuture,
};

/// Answers every request with the same response and records what it saw.
struct Recording {
    response: ApiResponse,
    seen: Mutex<Vec<ApiRequest>>,
}

impl Recording {
    fn new(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            response: ApiResponse::json_body(status, &body),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for Recording {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        self.seen.lock().unwrap().push(request);
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}

fn fern() -> NewPlant {
    NewPlant {
        name: "Fern".into(),
        image: "https://i.ibb.co/fern.png".into(),
        price: 12.5,
        quantity: 3,
        category: "Indoor".into(),
        description: "Boston fern".into(),
        seller: Seller {
            name: Some("Ada".into()),
            email: "a@x.com".into(),
            image: None,
        },
    }
}

#[tokio::test]
async fn test_list_plants_decodes_records() {
    let transport = Recording::new(
        200,
        json!([{"_id": "p1", "name": "Fern", "price": 12.5, "quantity": 3, "category": "Indoor"}]),
    );
    let client = ApiClient::new(transport.clone());

    let plants = client.list_plants().await.unwrap();

    assert_eq!(plants.len(), 1);
    assert_eq!(plants[0].id, "p1");
    assert_eq!(plants[0].category.as_deref(), Some("Indoor"));
    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].path, "plants");
    assert!(!requests[0].authenticated);
}

#[tokio::test]
async fn test_get_plant_uses_id_path() {
    let transport = Recording::new(200, json!({"_id": "p1", "name": "Fern", "price": 1.0, "quantity": 1}));
    let client = ApiClient::new(transport.clone());

    let plant = client.get_plant("p1").await.unwrap();

    assert_eq!(plant.name, "Fern");
    assert_eq!(transport.requests()[0].path, "plants/p1");
}

#[tokio::test]
async fn test_get_plant_rejects_blank_id() {
    let transport = Recording::new(200, json!({}));
    let client = ApiClient::new(transport.clone());

    let err = client.get_plant("  ").await.unwrap_err();

    assert!(err.is_validation());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_malformed_record_is_server_error() {
    let transport = Recording::new(200, json!([{"title": "not a plant"}]));
    let client = ApiClient::new(transport);

    let err = client.list_plants().await.unwrap_err();
    assert!(matches!(err, ClientError::Server { status: 200, .. }));
}

#[tokio::test]
async fn test_create_plant_posts_payload() {
    let transport = Recording::new(200, json!({"acknowledged": true, "insertedId": "p9"}));
    let client = ApiClient::new(transport.clone());

    let result = client.create_plant(&fern()).await.unwrap();

    assert!(result.is_acknowledged());
    assert_eq!(result.id(), Some("p9"));
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "plants");
    let body = request.body.as_ref().unwrap();
    assert_eq!(body["price"], json!(12.5));
    assert_eq!(body["quantity"], json!(3));
    assert_eq!(body["seller"]["email"], json!("a@x.com"));
}

#[tokio::test]
async fn test_unacknowledged_write_is_server_error() {
    let transport = Recording::new(200, json!({"acknowledged": false}));
    let client = ApiClient::new(transport.clone());

    let err = client.create_plant(&fern()).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::Server {
            status: 200,
            message: "write not acknowledged".into()
        }
    );
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_identifiers_stay_one_segment() {
    let transport = Recording::new(200, json!({"role": "admin"}));
    let client = ApiClient::new(transport.clone());

    client.user_role("a/b@x.com").await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.segments, ["users", "role", "a/b@x.com"]);
    assert_eq!(request.path, "users/role/a%2Fb@x.com");
}

#[tokio::test]
async fn test_invalid_plant_is_never_sent() {
    let transport = Recording::new(200, json!({}));
    let client = ApiClient::new(transport.clone());
    let mut plant = fern();
    plant.name.clear();
    plant.seller.email = "nobody".into();

    let err = client.create_plant(&plant).await.unwrap_err();

    let ClientError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert!(fields.iter().any(|f| f.field == "name"));
    assert!(fields.iter().any(|f| f.field.contains("email")));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_user_role_is_authenticated() {
    let transport = Recording::new(200, json!({"role": "seller"}));
    let client = ApiClient::new(transport.clone());

    let role = client.user_role("a@x.com").await.unwrap();

    assert_eq!(role, Role::Seller);
    let request = &transport.requests()[0];
    assert_eq!(request.path, "users/role/a@x.com");
    assert!(request.authenticated);
}

#[tokio::test]
async fn test_user_role_rejects_empty_email_locally() {
    let transport = Recording::new(200, json!({"role": "admin"}));
    let client = ApiClient::new(transport.clone());

    let err = client.user_role("").await.unwrap_err();

    assert_eq!(err, ClientError::invalid("email", "Email is required"));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_auth() {
    let transport = Recording::new(401, json!({"message": "unauthorized access"}));
    let client = ApiClient::new(transport);

    let err = client.user_role("a@x.com").await.unwrap_err();
    assert_eq!(err, ClientError::Auth("unauthorized access".into()));
}

#[tokio::test]
async fn test_server_failure_keeps_status() {
    let transport = Recording::new(500, json!({"error": "database offline"}));
    let client = ApiClient::new(transport);

    let err = client.list_plants().await.unwrap_err();
    assert_eq!(
        err,
        ClientError::Server { status: 500, message: "database offline".into() }
    );
}

#[tokio::test]
async fn test_uploader_requires_api_key() {
    let settings = UploadSettings {
        url: "http://127.0.0.1:9/upload".parse().unwrap(),
        api_key: None,
    };
    let uploader = HostedImageUploader::new(&settings, Duration::from_secs(1)).unwrap();

    let err = uploader
        .upload(ImageFile::new("fern.png", vec![1u8, 2, 3]))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_uploader_rejects_empty_image() {
    let settings = UploadSettings {
        url: "http://127.0.0.1:9/upload".parse().unwrap(),
        api_key: Some("key".into()),
    };
    let uploader = HostedImageUploader::new(&settings, Duration::from_secs(1)).unwrap();

    let err = uploader.upload(ImageFile::new("empty.png", Vec::<u8>::new())).await.unwrap_err();
    assert_eq!(err, ClientError::invalid("image", "Image is required"));
}

#[test]
fn test_image_from_path_guesses_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fern.PNG");
    std::fs::write(&path, [137u8, 80, 78, 71]).unwrap();

    let image = ImageFile::from_path(&path).unwrap();

    assert_eq!(image.file_name, "fern.PNG");
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.bytes.len(), 4);
}

#[test]
fn test_image_from_missing_path_is_validation_error() {
    let err = ImageFile::from_path("/definitely/not/here.png").unwrap_err();
    assert!(err.is_validation());
}
