// ============================================================================
// Save Handler
// ============================================================================
// `POST /save`. The body is decoded and validated here; only documents that
// pass every field rule are serialized back to canonical JSON and published.
// The handler waits for the broker acknowledgment, so an OK response means
// the order is durably queued, not yet persisted.

use actix_web::{web, HttpResponse};
use tracing::{error, info, warn};
use validator::Validate;

use super::{response, AppState};
use crate::domain::Order;

pub async fn save_order(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    if body.is_empty() {
        warn!("request body is empty");
        return response::bad_request("empty request");
    }

    let order: Order = match serde_json::from_slice(&body) {
        Ok(order) => order,
        Err(e) => {
            warn!(error = %e, "failed to decode request body");
            return response::bad_request("failed to decode request body");
        }
    };

    if let Err(errs) = order.validate() {
        warn!(order_uid = %order.order_uid, "order failed validation");
        return response::validation_failure(&errs);
    }

    let payload = match serde_json::to_vec(&order) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, order_uid = %order.order_uid, "failed to serialize order");
            return response::internal_error("failed to serialize order");
        }
    };

    if let Err(e) = state.publisher.publish(&state.topic, &payload).await {
        state.metrics.publish_failures.inc();
        error!(error = %e, order_uid = %order.order_uid, "failed to publish order");
        return response::bad_gateway("failed to publish order");
    }

    state.metrics.orders_published.inc();
    info!(
        order_uid = %order.order_uid,
        track_number = %order.track_number,
        "order accepted for ingestion"
    );
    response::ok_save(order.track_number)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{test, App};

    use super::super::testing::{test_state, ReadOutcome, StubPublisher, StubReader};
    use super::super::routes;
    use super::*;
    use crate::domain::test_order;

    async fn post_save(
        publisher: Arc<StubPublisher>,
        body: Vec<u8>,
    ) -> (actix_web::http::StatusCode, serde_json::Value) {
        let state = test_state(StubReader(ReadOutcome::Missing), publisher);
        let app = test::init_service(App::new().app_data(state).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/save")
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        let status = resp.status();
        let body: serde_json::Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn valid_order_is_published_and_acknowledged() {
        let publisher = Arc::new(StubPublisher::default());
        let order = test_order("b563feb7b2b84b6test");
        let body = serde_json::to_vec(&order).unwrap();

        let (status, response) = post_save(publisher.clone(), body).await;

        assert_eq!(status, 200);
        assert_eq!(
            response,
            serde_json::json!({"status": "OK", "trackNumber": "WBILMTESTTRACK"})
        );

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "orders");
        let round_tripped: Order = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(round_tripped, order);
    }

    #[actix_web::test]
    async fn empty_body_is_rejected() {
        let (status, response) = post_save(Arc::new(StubPublisher::default()), Vec::new()).await;

        assert_eq!(status, 400);
        assert_eq!(response["errors"]["error"], "empty request");
    }

    #[actix_web::test]
    async fn malformed_body_is_rejected() {
        let (status, response) =
            post_save(Arc::new(StubPublisher::default()), b"{broken".to_vec()).await;

        assert_eq!(status, 400);
        assert_eq!(response["errors"]["error"], "failed to decode request body");
    }

    #[actix_web::test]
    async fn invalid_order_is_rejected_with_field_errors() {
        let publisher = Arc::new(StubPublisher::default());
        let mut order = test_order("b563feb7b2b84b6test");
        order.delivery.email = "nope".into();
        let body = serde_json::to_vec(&order).unwrap();

        let (status, response) = post_save(publisher.clone(), body).await;

        assert_eq!(status, 400);
        assert_eq!(response["status"], "Error");
        assert!(response["errors"]["delivery.email"].is_string());
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn broker_failure_maps_to_bad_gateway() {
        let publisher = Arc::new(StubPublisher {
            fail: true,
            ..Default::default()
        });
        let body = serde_json::to_vec(&test_order("b563feb7b2b84b6test")).unwrap();

        let (status, response) = post_save(publisher, body).await;

        assert_eq!(status, 502);
        assert_eq!(response["errors"]["error"], "failed to publish order");
    }
}
