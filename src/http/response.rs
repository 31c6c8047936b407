// ============================================================================
// HTTP Response Envelopes
// ============================================================================
// Every endpoint answers with the same envelope: a `status` string plus
// either the requested payload or an `errors` map. Internal causes stay in
// the log stream; clients only ever see the message text.

use std::collections::BTreeMap;

use actix_web::HttpResponse;
use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::domain::Order;

pub const STATUS_OK: &str = "OK";
pub const STATUS_ERROR: &str = "Error";

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub status: &'static str,
    #[serde(rename = "trackNumber")]
    pub track_number: String,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub status: &'static str,
    pub order: Order,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub errors: BTreeMap<String, String>,
}

fn error_body(msg: &str) -> ErrorResponse {
    let mut errors = BTreeMap::new();
    errors.insert("error".to_string(), msg.to_string());
    ErrorResponse {
        status: STATUS_ERROR,
        errors,
    }
}

pub fn ok_save(track_number: String) -> HttpResponse {
    HttpResponse::Ok().json(SaveResponse {
        status: STATUS_OK,
        track_number,
    })
}

pub fn ok_order(order: Order) -> HttpResponse {
    HttpResponse::Ok().json(OrderResponse {
        status: STATUS_OK,
        order,
    })
}

pub fn bad_request(msg: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(error_body(msg))
}

pub fn not_found(msg: &str) -> HttpResponse {
    HttpResponse::NotFound().json(error_body(msg))
}

pub fn internal_error(msg: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(error_body(msg))
}

pub fn bad_gateway(msg: &str) -> HttpResponse {
    HttpResponse::BadGateway().json(error_body(msg))
}

pub fn validation_failure(errs: &ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        status: STATUS_ERROR,
        errors: flatten_errors(errs),
    })
}

/// Flattens nested validation errors into one field-to-message map. Nested
/// struct fields are dotted (`delivery.email`), list entries are indexed
/// (`items[0].price`). One message per field is enough for the client.
pub fn flatten_errors(errs: &ValidationErrors) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    collect_errors(errs, "", &mut flat);
    flat
}

fn collect_errors(errs: &ValidationErrors, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (field, kind) in errs.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(err) = field_errors.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.insert(path, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &path, out),
            ValidationErrorsKind::List(entries) => {
                for (index, nested) in entries {
                    collect_errors(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;
    use crate::domain::test_order;

    #[test]
    fn save_envelope_uses_camel_case_track_number() {
        let body = serde_json::to_value(SaveResponse {
            status: STATUS_OK,
            track_number: "WBILMTESTTRACK".into(),
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"status": "OK", "trackNumber": "WBILMTESTTRACK"})
        );
    }

    #[test]
    fn error_body_carries_a_single_error_entry() {
        let body = serde_json::to_value(error_body("empty request")).unwrap();

        assert_eq!(
            body,
            serde_json::json!({"status": "Error", "errors": {"error": "empty request"}})
        );
    }

    #[test]
    fn order_envelope_nests_the_full_document() {
        let body = serde_json::to_value(OrderResponse {
            status: STATUS_OK,
            order: test_order("b563feb7b2b84b6test"),
        })
        .unwrap();

        assert_eq!(body["status"], "OK");
        assert_eq!(body["order"]["order_uid"], "b563feb7b2b84b6test");
        assert_eq!(body["order"]["shardkey"], "9");
    }

    #[test]
    fn nested_field_errors_are_dotted() {
        let mut order = test_order("b563feb7b2b84b6test");
        order.delivery.email = "not-an-email".into();
        order.payment.currency = "DOLLARS".into();

        let errs = order.validate().unwrap_err();
        let flat = flatten_errors(&errs);

        assert!(flat.contains_key("delivery.email"));
        assert!(flat.contains_key("payment.currency"));
    }

    #[test]
    fn list_entry_errors_are_indexed() {
        let mut order = test_order("b563feb7b2b84b6test");
        order.items.push(order.items[0].clone());
        order.items[1].price = 0;

        let errs = order.validate().unwrap_err();
        let flat = flatten_errors(&errs);

        assert!(flat.contains_key("items[1].price"));
        assert!(!flat.contains_key("items[0].price"));
    }

    #[test]
    fn empty_items_error_sits_at_the_top_level() {
        let mut order = test_order("b563feb7b2b84b6test");
        order.items.clear();

        let errs = order.validate().unwrap_err();
        let flat = flatten_errors(&errs);

        assert!(flat.contains_key("items"));
    }
}
