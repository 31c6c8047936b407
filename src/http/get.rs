// ============================================================================
// Get Handler
// ============================================================================
// `GET /orders/{order_uid}`. Reads go through the cache-aside reader; the
// handler only translates the outcome into the response envelope.

use actix_web::{web, HttpResponse};
use tracing::{error, warn};

use super::{response, AppState};

pub async fn get_order(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let order_uid = path.into_inner();

    match state.reader.get_order_by_uid(&order_uid).await {
        Ok(order) => response::ok_order(order),
        Err(e) if e.is_not_found() => {
            warn!(order_uid = %order_uid, "order not found");
            response::not_found("order not found")
        }
        Err(e) => {
            error!(error = %e, order_uid = %order_uid, "failed to get order");
            response::internal_error("failed to get order")
        }
    }
}
