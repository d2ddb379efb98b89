use garde::Validate;
use verdant_core::{ClientError, FieldError, NewPlant, Seller};

#[test]
fn retryable_classification() {
    assert!(ClientError::Transport("timed out".into()).is_retryable());
    assert!(ClientError::Server { status: 503, message: "busy".into() }.is_retryable());
    assert!(!ClientError::Server { status: 404, message: "gone".into() }.is_retryable());
    assert!(!ClientError::Auth("expired".into()).is_retryable());
    assert!(!ClientError::invalid("name", "Name is required").is_retryable());
}

#[test]
fn display_includes_details() {
    let err = ClientError::Server { status: 500, message: "boom".into() };
    assert_eq!(err.to_string(), "Server error (500): boom");

    let err = ClientError::Validation(vec![
        FieldError::new("name", "Name is required"),
        FieldError::new("price", "Price is required"),
    ]);
    assert_eq!(
        err.to_string(),
        "Validation failed: name: Name is required; price: Price is required;"
    );
}

#[test]
fn public_messages_hide_details() {
    let err = ClientError::Auth("token for a@x.com expired at 12:00".into());
    assert_eq!(err.public_message(), "Please sign in again");
}

#[test]
fn garde_report_becomes_validation_error() {
    let plant = NewPlant {
        name: String::new(),
        image: "https://i.ibb.co/fern.png".into(),
        price: -1.0,
        quantity: 1,
        category: "Indoor".into(),
        description: "Fern".into(),
        seller: Seller {
            name: None,
            email: "a@x.com".into(),
            image: None,
        },
    };
    let err = ClientError::from(plant.validate().unwrap_err());
    let ClientError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
    assert!(names.contains(&"name"));
    assert!(names.contains(&"price"));
}
