use serde_json::json;
use verdant_core::Seller;
use verdant_http::CredentialProvider;
use verdant_security::{AuthState, IdentityProvider, Principal};

#[test]
fn test_principal_uses_provider_field_names() {
    let principal: Principal = serde_json::from_value(json!({
        "id": "u1",
        "email": "a@x.com",
        "displayName": "Ada",
        "photoURL": "https://img/ada.png"
    }))
    .unwrap();

    assert_eq!(principal.display_name.as_deref(), Some("Ada"));
    assert_eq!(principal.photo_url.as_deref(), Some("https://img/ada.png"));
    assert_eq!(serde_json::to_value(&principal).unwrap()["photoURL"], json!("https://img/ada.png"));
}

#[test]
fn test_seller_snapshot_from_principal() {
    let principal = Principal::new("u1", "a@x.com")
        .with_display_name("Ada")
        .with_photo_url("https://img/ada.png");

    let seller = Seller::from(&principal);

    assert_eq!(seller.name.as_deref(), Some("Ada"));
    assert_eq!(seller.email, "a@x.com");
    assert_eq!(seller.image.as_deref(), Some("https://img/ada.png"));
}

#[test]
fn test_auth_state_email() {
    assert_eq!(AuthState::loading().email(), None);
    assert_eq!(AuthState::anonymous().email(), None);
    assert_eq!(AuthState::signed_in(Principal::new("u1", "")).email(), None);
    assert_eq!(
        AuthState::signed_in(Principal::new("u1", " a@x.com ")).email(),
        Some("a@x.com")
    );
    assert!(!AuthState::loading().is_authenticated());
}

#[test]
fn test_provider_lifecycle() {
    let provider = IdentityProvider::new();
    assert_eq!(provider.current(), AuthState::loading());
    assert_eq!(provider.token(), None);

    provider.sign_in(Principal::new("u1", "a@x.com"), Some("tok-1".into()));
    assert!(provider.current().is_authenticated());
    assert_eq!(provider.token().as_deref(), Some("tok-1"));

    provider.set_token(Some("tok-2".into()));
    assert_eq!(provider.token().as_deref(), Some("tok-2"));

    provider.sign_out();
    assert_eq!(provider.current(), AuthState::anonymous());
    assert_eq!(provider.token(), None);
}

#[tokio::test]
async fn test_watchers_see_changes() {
    let provider = IdentityProvider::new();
    let mut watch = provider.watch();

    provider.sign_in(Principal::new("u1", "a@x.com"), None);
    watch.changed().await.unwrap();
    assert_eq!(watch.borrow().principal.as_ref().map(|p| p.email.as_str()), Some("a@x.com"));

    provider.begin_loading();
    watch.changed().await.unwrap();
    assert!(watch.borrow().loading);
}
