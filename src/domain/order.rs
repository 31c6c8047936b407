use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

// ============================================================================
// Order Aggregate - Wire Format and Field Rules
// ============================================================================
//
// One Order owns exactly one Delivery, exactly one Payment and at least one
// OrderItem. The same serde shape is used on every edge of the pipeline:
// HTTP request body, Kafka payload and lookup response, so a document that
// enters through POST /save leaves GET /orders/{order_uid} byte-compatible.
//
// Missing scalar fields decode to their defaults and are then rejected by
// validation with a field-tagged error; only `date_created` must be present
// for the document to decode at all.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub order_uid: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub track_number: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub entry: String,

    #[serde(default)]
    #[validate(nested)]
    pub delivery: Delivery,

    #[serde(default)]
    #[validate(nested)]
    pub payment: Payment,

    #[serde(default)]
    #[validate(length(min = 1, message = "must contain at least one item"), nested)]
    pub items: Vec<OrderItem>,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub locale: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub internal_signature: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub customer_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub delivery_service: String,

    // Wire name has no underscore; the DB column matches it.
    #[serde(default, rename = "shardkey")]
    #[validate(length(min = 1, message = "required"))]
    pub shard_key: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub sm_id: i64,

    pub date_created: DateTime<Utc>,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Delivery {
    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub name: String,

    #[serde(default)]
    #[validate(custom(function = validate_e164))]
    pub phone: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub zip: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub city: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub address: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub region: String,

    #[serde(default)]
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Payment {
    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub transaction: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub request_id: String,

    #[serde(default)]
    #[validate(length(equal = 3, message = "must be a 3-letter currency code"))]
    pub currency: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub provider: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub amount: i64,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a unix timestamp"))]
    pub payment_dt: i64,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub bank: String,

    // Zero is legitimate for the cost split fields, negative is not.
    #[serde(default)]
    #[validate(range(min = 0, message = "must not be negative"))]
    pub delivery_cost: i64,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub goods_total: i64,

    #[serde(default)]
    #[validate(range(min = 0, message = "must not be negative"))]
    pub custom_fee: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct OrderItem {
    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub chrt_id: i64,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub track_number: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub price: i64,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub rid: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub name: String,

    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "must be a percentage"))]
    pub sale: i32,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub size: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub total_price: i64,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive integer"))]
    pub nm_id: i64,

    #[serde(default)]
    #[validate(length(min = 1, message = "required"))]
    pub brand: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "must be a positive status code"))]
    pub status: i32,
}

/// E.164: a `+`, then 1-15 digits, the first of which is non-zero.
fn validate_e164(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or("");
    let well_formed = !digits.is_empty()
        && digits.len() <= 15
        && !digits.starts_with('0')
        && digits.bytes().all(|b| b.is_ascii_digit());

    if well_formed {
        Ok(())
    } else {
        let mut err = ValidationError::new("e164");
        err.message = Some("must be an E.164 phone number".into());
        Err(err)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
