// ============================================================================
// HTTP - Ingestion and read API
// ============================================================================
// `POST /save` validates an order document and publishes it to the broker;
// `GET /orders/{order_uid}` serves persisted orders through the cache-aside
// reader. `/health` and `/metrics` ride on the same server.

pub mod response;

mod get;
mod save;

use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};

use crate::config::HttpConfig;
use crate::messaging::MessagePublisher;
use crate::metrics::Metrics;
use crate::storage::OrderReader;

/// Shared state handed to every server worker.
pub struct AppState {
    pub reader: Arc<dyn OrderReader>,
    pub publisher: Arc<dyn MessagePublisher>,
    pub topic: String,
    pub metrics: Arc<Metrics>,
}

/// Binds the listener and returns the running server future. The caller
/// decides where to await it and when to stop it.
pub fn run_server(config: &HttpConfig, state: AppState) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new().app_data(state.clone()).configure(routes)
    })
    .client_request_timeout(config.request_timeout)
    .keep_alive(config.idle_timeout)
    .bind(config.addr.as_str())?
    .run();

    Ok(server)
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/save", web::post().to(save::save_order))
        .route("/orders/{order_uid}", web::get().to(get::get_order))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "orderflow"
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{test_order, Order};
    use crate::messaging::PublishError;
    use crate::storage::StorageError;

    pub(crate) enum ReadOutcome {
        Found,
        Missing,
        Broken,
    }

    pub(crate) struct StubReader(pub ReadOutcome);

    #[async_trait]
    impl OrderReader for StubReader {
        async fn get_order_by_uid(&self, order_uid: &str) -> Result<Order, StorageError> {
            match self.0 {
                ReadOutcome::Found => Ok(test_order(order_uid)),
                ReadOutcome::Missing => Err(StorageError::NotFound {
                    order_uid: order_uid.to_string(),
                }),
                ReadOutcome::Broken => Err(StorageError::Timeout {
                    op: "get order",
                    timeout: Duration::from_secs(5),
                }),
            }
        }
    }

    #[derive(Default)]
    pub(crate) struct StubPublisher {
        pub fail: bool,
        pub published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl MessagePublisher for StubPublisher {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::AckDropped);
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    pub(crate) fn test_state(
        reader: StubReader,
        publisher: Arc<StubPublisher>,
    ) -> web::Data<AppState> {
        web::Data::new(AppState {
            reader: Arc::new(reader),
            publisher,
            topic: "orders".into(),
            metrics: Arc::new(Metrics::new().unwrap()),
        })
    }
}
