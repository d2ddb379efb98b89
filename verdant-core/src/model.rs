//! Records exchanged with the marketplace API.
//!
//! Every endpoint has an explicit record; responses that do not deserialize
//! into it are rejected at the boundary instead of leaking missing fields.

use std::fmt;
use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Categories offered by the listing form.
pub const PLANT_CATEGORIES: [&str; 4] = ["Indoor", "Outdoor", "Succulent", "Flowering"];

/// Public snapshot of the principal who listed a plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Seller {
    #[garde(skip)]
    #[serde(default)]
    pub name: Option<String>,
    #[garde(custom(is_email))]
    pub email: String,
    #[garde(skip)]
    #[serde(default)]
    pub image: Option<String>,
}

/// A plant listing as returned by `GET /plants` and `GET /plants/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub seller: Option<Seller>,
}

/// Body of `POST /plants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewPlant {
    #[garde(length(min = 1))]
    pub name: String,
    /// Hosted URL returned by the image upload.
    #[garde(length(min = 1))]
    pub image: String,
    #[garde(range(min = 0.0))]
    pub price: f64,
    #[garde(skip)]
    pub quantity: u32,
    #[garde(length(min = 1))]
    pub category: String,
    #[garde(length(min = 1))]
    pub description: String,
    #[garde(dive)]
    pub seller: Seller,
}

fn is_email(value: &str, _: &()) -> garde::Result {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(garde::Error::new("not a valid email address")),
    }
}

/// Raw listing form input, exactly as typed by the seller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlantForm {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
}

/// A checked form: required fields present, price and quantity coerced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantDraft {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    pub quantity: u32,
}

impl PlantForm {
    /// Check required fields and coerce the numeric ones.
    ///
    /// Collects every field error instead of stopping at the first.
    pub fn validate(&self) -> Result<PlantDraft, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = required(&self.name, "name", "Name is required", &mut errors);
        let category = required(&self.category, "category", "Category is required", &mut errors);
        if !category.is_empty() && !PLANT_CATEGORIES.contains(&category.as_str()) {
            errors.push(FieldError::new("category", format!("Unknown category '{category}'")));
        }
        let description = required(
            &self.description,
            "description",
            "Description is required",
            &mut errors,
        );

        let price = match self.price.trim() {
            "" => {
                errors.push(FieldError::new("price", "Price is required"));
                0.0
            }
            raw => match raw.parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => p,
                Ok(_) => {
                    errors.push(FieldError::new("price", "Price must be a non-negative number"));
                    0.0
                }
                Err(_) => {
                    errors.push(FieldError::new("price", "Price must be a number"));
                    0.0
                }
            },
        };

        let quantity = match self.quantity.trim() {
            "" => {
                errors.push(FieldError::new("quantity", "Quantity is required"));
                0
            }
            raw => raw.parse::<u32>().unwrap_or_else(|_| {
                errors.push(FieldError::new("quantity", "Quantity must be a whole number"));
                0
            }),
        };

        if errors.is_empty() {
            Ok(PlantDraft {
                name,
                category,
                description,
                price,
                quantity,
            })
        } else {
            Err(errors)
        }
    }

    /// Clear every field.
    pub fn reset(&mut self) {
        *self = PlantForm::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == PlantForm::default()
    }
}

fn required(value: &str, field: &str, message: &str, errors: &mut Vec<FieldError>) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, message));
    }
    value.to_string()
}

impl PlantDraft {
    pub fn into_new_plant(self, image: String, seller: Seller) -> NewPlant {
        NewPlant {
            name: self.name,
            image,
            price: self.price,
            quantity: self.quantity,
            category: self.category,
            description: self.description,
            seller,
        }
    }
}

/// Authorization tag attached to a user account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Seller,
    Customer,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Seller => "seller",
            Role::Customer => "customer",
            Role::Other(tag) => tag,
        }
    }
}

impl From<String> for Role {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "seller" => Role::Seller,
            "customer" | "buyer" => Role::Customer,
            _ => Role::Other(tag),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::from(s.to_string()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /users/role/{email}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleResponse {
    pub role: String,
}

/// Acknowledgment of a write: `{acknowledged, insertedId}` or the created
/// resource itself, kept in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
    #[serde(rename = "insertedId", default, skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl MutationResult {
    /// Identifier of the created resource, from `insertedId` or `_id`.
    pub fn id(&self) -> Option<&str> {
        self.inserted_id
            .as_deref()
            .or_else(|| self.fields.get("_id").and_then(|v| v.as_str()))
    }

    /// A write counts as rejected only when the server says so explicitly.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> PlantForm {
        PlantForm {
            name: "Fern".into(),
            category: "Indoor".into(),
            description: "Boston fern".into(),
            price: "10".into(),
            quantity: "5".into(),
        }
    }

    #[test]
    fn form_coerces_numbers() {
        let draft = filled_form().validate().unwrap();
        assert_eq!(draft.price, 10.0);
        assert_eq!(draft.quantity, 5);
    }

    #[test]
    fn form_reports_every_missing_field() {
        let errors = PlantForm::default().validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "category", "description", "price", "quantity"]);
        assert_eq!(errors[0].message, "Name is required");
    }

    #[test]
    fn form_rejects_garbage_numbers() {
        let mut form = filled_form();
        form.price = "ten".into();
        form.quantity = "-1".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "price");
        assert_eq!(errors[1].field, "quantity");
    }

    #[test]
    fn form_rejects_unknown_category() {
        let mut form = filled_form();
        form.category = "Cactus".into();
        assert_eq!(form.validate().unwrap_err()[0].field, "category");
    }

    #[test]
    fn reset_clears_form() {
        let mut form = filled_form();
        form.reset();
        assert!(form.is_empty());
    }

    #[test]
    fn new_plant_requires_seller_email() {
        let plant = filled_form().validate().unwrap().into_new_plant(
            "https://i.ibb.co/fern.png".into(),
            Seller {
                name: Some("Ada".into()),
                email: "not-an-email".into(),
                image: None,
            },
        );
        let report = plant.validate().unwrap_err();
        assert!(report.iter().any(|(path, _)| path.to_string() == "seller.email"));
    }

    #[test]
    fn plant_accepts_minimal_record() {
        let plant: Plant = serde_json::from_value(serde_json::json!({
            "_id": "1", "name": "Fern", "price": 10, "quantity": 5
        }))
        .unwrap();
        assert_eq!(plant.id, "1");
        assert_eq!(plant.price, 10.0);
        assert!(plant.seller.is_none());
    }

    #[test]
    fn plant_rejects_missing_name() {
        let result: Result<Plant, _> =
            serde_json::from_value(serde_json::json!({ "_id": "1", "price": 10, "quantity": 5 }));
        assert!(result.is_err());
    }

    #[test]
    fn role_parses_known_tags() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::from("buyer".to_string()), Role::Customer);
        assert_eq!(Role::from("curator".to_string()), Role::Other("curator".into()));
        assert_eq!(Role::Seller.to_string(), "seller");
    }

    #[test]
    fn mutation_result_reads_inserted_id() {
        let result: MutationResult = serde_json::from_value(serde_json::json!({
            "acknowledged": true, "insertedId": "64f1"
        }))
        .unwrap();
        assert_eq!(result.id(), Some("64f1"));
        assert!(result.is_acknowledged());

        let created: MutationResult =
            serde_json::from_value(serde_json::json!({ "_id": "77", "name": "Fern" })).unwrap();
        assert_eq!(created.id(), Some("77"));
    }
}
