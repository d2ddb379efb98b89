use std::sync::Arc;

use serde_json::json;
use verdant::prelude::*;
use verdant::verdant_http::Method;
use verdant::{PLANT_ADDED, PLANT_ADD_FAILED};
use verdant_test::{MockTransport, MockUploader};

const IMAGE_URL: &str = "https://i.ibb.co/fern.png";

async fn signed_in(mock: &Arc<MockTransport>, uploader: Arc<MockUploader>) -> Marketplace {
    let identity = IdentityProvider::new();
    identity.sign_in(
        Principal::new("u1", "a@x.com")
            .with_display_name("Ada")
            .with_photo_url("https://img/ada.png"),
        Some("tok".into()),
    );
    Marketplace::new(
        ClientConfig::new("http://api.test".parse().unwrap()),
        mock.clone(),
        uploader,
        identity,
    )
    .await
}

fn form() -> PlantForm {
    PlantForm {
        name: "Fern".into(),
        category: "Indoor".into(),
        description: "Boston fern".into(),
        price: "10".into(),
        quantity: "5".into(),
    }
}

fn image() -> Option<ImageFile> {
    Some(ImageFile::new("fern.png", vec![1u8, 2, 3]))
}

#[tokio::test]
async fn test_submit_creates_plant_and_refreshes_listing() {
    let mock = MockTransport::new();
    mock.on_get("plants", 200, json!([]));
    mock.on_post("plants", 200, json!({"acknowledged": true, "insertedId": "p9"}));
    let uploader = MockUploader::succeeding(IMAGE_URL);
    let market = signed_in(&mock, uploader.clone()).await;
    let log = market.notifications().await;

    let mut plants = market.plants();
    plants.settled().await;

    let flow = market.add_plant_flow();
    let mut form = form();
    let result = flow.submit(&mut form, image()).await.unwrap();

    assert_eq!(result.id(), Some("p9"));
    assert!(form.is_empty());
    assert_eq!(log.entries(), vec![Notification::success(PLANT_ADDED)]);
    assert_eq!(uploader.upload_count(), 1);

    let post = mock
        .calls()
        .into_iter()
        .find(|c| c.method == Method::POST)
        .unwrap();
    assert_eq!(post.path, "plants");
    assert_eq!(
        post.body.unwrap(),
        json!({
            "name": "Fern",
            "image": IMAGE_URL,
            "price": 10.0,
            "quantity": 5,
            "category": "Indoor",
            "description": "Boston fern",
            "seller": {"name": "Ada", "email": "a@x.com", "image": "https://img/ada.png"}
        })
    );

    // The listing was invalidated while subscribed, so it refetches.
    plants.settled().await;
    assert_eq!(mock.call_count(Method::GET, "plants"), 2);
}

#[tokio::test]
async fn test_missing_name_is_rejected_locally() {
    let mock = MockTransport::new();
    let uploader = MockUploader::succeeding(IMAGE_URL);
    let market = signed_in(&mock, uploader.clone()).await;
    let log = market.notifications().await;
    let flow = market.add_plant_flow();
    let watch = flow.mutation().watch();

    let mut form = PlantForm {
        name: "  ".into(),
        ..form()
    };
    let err = flow.submit(&mut form, image()).await.unwrap_err();

    let ClientError::Validation(errors) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(errors[0].field, "name");
    assert_eq!(errors[0].message, "Name is required");
    assert_eq!(uploader.upload_count(), 0);
    assert_eq!(mock.total_calls(), 0);
    assert!(!watch.has_changed().unwrap());
    assert_eq!(flow.mutation().state().status, FetchStatus::Idle);
    assert!(log.entries().is_empty());
    assert_eq!(form.category, "Indoor");
}

#[tokio::test]
async fn test_missing_image_is_rejected_locally() {
    let mock = MockTransport::new();
    let uploader = MockUploader::succeeding(IMAGE_URL);
    let market = signed_in(&mock, uploader.clone()).await;
    let flow = market.add_plant_flow();

    let err = flow.submit(&mut form(), None).await.unwrap_err();
    assert_eq!(err, ClientError::invalid("image", "Image is required"));

    let empty = Some(ImageFile::new("fern.png", Vec::<u8>::new()));
    let err = flow.submit(&mut form(), empty).await.unwrap_err();
    assert_eq!(err, ClientError::invalid("image", "Image is required"));
    assert_eq!(uploader.upload_count(), 0);
}

#[tokio::test]
async fn test_upload_failure_skips_mutation() {
    let mock = MockTransport::new();
    mock.on_post("plants", 200, json!({"acknowledged": true, "insertedId": "p9"}));
    let uploader = MockUploader::failing(ClientError::Transport("connection reset".into()));
    let market = signed_in(&mock, uploader).await;
    let log = market.notifications().await;
    let flow = market.add_plant_flow();

    let mut form = form();
    let err = flow.submit(&mut form, image()).await.unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(mock.call_count(Method::POST, "plants"), 0);
    assert_eq!(log.entries(), vec![Notification::error(PLANT_ADD_FAILED)]);
    assert_eq!(flow.mutation().state().status, FetchStatus::Idle);
    assert!(!form.is_empty());
}

#[tokio::test]
async fn test_mutation_waits_for_upload() {
    let mock = MockTransport::new();
    mock.on_post("plants", 200, json!({"acknowledged": true, "insertedId": "p9"}));
    let (uploader, release) = MockUploader::gated();
    let market = signed_in(&mock, uploader.clone()).await;
    let flow = market.add_plant_flow();

    let submit = tokio::spawn({
        let flow = flow.clone();
        async move { flow.submit(&mut form(), image()).await }
    });

    while uploader.upload_count() == 0 {
        tokio::task::yield_now().await;
    }
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(mock.total_calls(), 0);
    assert!(!flow.is_pending());

    release.send(Ok(IMAGE_URL.to_string())).unwrap();
    submit.await.unwrap().unwrap();

    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body.as_ref().unwrap()["image"], json!(IMAGE_URL));
}

#[tokio::test]
async fn test_unacknowledged_write_is_a_failure() {
    let mock = MockTransport::new();
    mock.on_get("plants", 200, json!([]));
    mock.on_post("plants", 200, json!({"acknowledged": false}));
    let market = signed_in(&mock, MockUploader::succeeding(IMAGE_URL)).await;
    let log = market.notifications().await;
    let mut plants = market.plants();
    plants.settled().await;
    let flow = market.add_plant_flow();

    let mut form = form();
    let err = flow.submit(&mut form, image()).await.unwrap_err();

    assert!(matches!(err, ClientError::Server { status: 200, .. }));
    assert!(flow.mutation().is_error());
    assert_eq!(log.entries(), vec![Notification::error(PLANT_ADD_FAILED)]);
    assert_eq!(form.name, "Fern");
    assert_eq!(mock.call_count(Method::GET, "plants"), 1);
}

#[tokio::test]
async fn test_server_failure_notifies_and_keeps_form() {
    let mock = MockTransport::new();
    mock.on_post("plants", 500, json!({"message": "database unavailable"}));
    let market = signed_in(&mock, MockUploader::succeeding(IMAGE_URL)).await;
    let log = market.notifications().await;
    let flow = market.add_plant_flow();

    let mut form = form();
    let err = flow.submit(&mut form, image()).await.unwrap_err();

    assert_eq!(
        err,
        ClientError::Server {
            status: 500,
            message: "database unavailable".into()
        }
    );
    assert!(flow.mutation().is_error());
    assert_eq!(log.last(), Some(Notification::error(PLANT_ADD_FAILED)));
    assert_eq!(form.name, "Fern");
}

#[tokio::test]
async fn test_anonymous_seller_cannot_submit() {
    let mock = MockTransport::new();
    let uploader = MockUploader::succeeding(IMAGE_URL);
    let market = Marketplace::new(
        ClientConfig::new("http://api.test".parse().unwrap()),
        mock.clone(),
        uploader.clone(),
        IdentityProvider::new(),
    )
    .await;
    market.identity().sign_out();
    let log = market.notifications().await;

    let err = market.add_plant_flow().submit(&mut form(), image()).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(uploader.upload_count(), 0);
    assert_eq!(mock.total_calls(), 0);
    assert_eq!(log.last(), Some(Notification::error(PLANT_ADD_FAILED)));
}

#[tokio::test]
async fn test_submit_against_server() {
    let server = verdant_test::MockServer::start().await;
    server.require_upload_key("imgbb-key");
    let mut config = server.config();
    config.upload.api_key = Some("imgbb-key".into());

    let market = Marketplace::connect(config).await.unwrap();
    market.identity().sign_in(Principal::new("u1", "a@x.com"), None);
    let mut form = form();

    let result = market
        .add_plant_flow()
        .submit(&mut form, image())
        .await
        .unwrap();

    assert!(result.is_acknowledged());
    let stored = server.plants();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["name"], json!("Fern"));
    assert_eq!(stored[0]["seller"]["email"], json!("a@x.com"));
    assert!(stored[0]["image"].as_str().unwrap().starts_with("https://i.ibb.co/mock/"));
    assert_eq!(server.hits(), ["POST /upload", "POST /plants"]);
}
