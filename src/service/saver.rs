// ============================================================================
// Order Saver
// ============================================================================
// Decodes consumed payloads and persists them. Decode failures never reach
// storage; duplicate orders are counted separately so redeliveries are
// visible without polluting the failure metrics.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use super::{IngestError, OrderProcessor};
use crate::domain::Order;
use crate::metrics::Metrics;
use crate::storage::OrderWriter;

pub struct OrderSaver<W> {
    writer: W,
    metrics: Arc<Metrics>,
}

impl<W: OrderWriter> OrderSaver<W> {
    pub fn new(writer: W, metrics: Arc<Metrics>) -> Self {
        Self { writer, metrics }
    }
}

#[async_trait]
impl<W: OrderWriter> OrderProcessor for OrderSaver<W> {
    async fn process(&self, payload: &[u8]) -> Result<(), IngestError> {
        let order: Order = serde_json::from_slice(payload).map_err(|e| {
            self.metrics.record_persist_failure("decode");
            IngestError::Decode(e)
        })?;

        let started = Instant::now();
        match self.writer.save_order(&order).await {
            Ok(()) => {
                self.metrics.record_persist(started.elapsed().as_secs_f64());
                info!(order_uid = %order.order_uid, "order persisted");
                Ok(())
            }
            Err(e) if e.is_duplicate() => {
                self.metrics.duplicate_orders.inc();
                Err(IngestError::Persist(e))
            }
            Err(e) => {
                self.metrics.record_persist_failure("storage");
                Err(IngestError::Persist(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::domain::test_order;
    use crate::storage::StorageError;

    enum Behavior {
        Succeed,
        Duplicate,
        Fail,
    }

    struct StubWriter {
        calls: Arc<AtomicUsize>,
        behavior: Behavior,
    }

    #[async_trait]
    impl OrderWriter for StubWriter {
        async fn save_order(&self, order: &Order) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Duplicate => Err(StorageError::Duplicate {
                    order_uid: order.order_uid.clone(),
                }),
                Behavior::Fail => Err(StorageError::Timeout {
                    op: "save order",
                    timeout: Duration::from_secs(5),
                }),
            }
        }
    }

    fn saver_with(behavior: Behavior) -> (OrderSaver<StubWriter>, Arc<AtomicUsize>, Arc<Metrics>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let writer = StubWriter {
            calls: calls.clone(),
            behavior,
        };
        let metrics = Arc::new(Metrics::new().unwrap());
        (OrderSaver::new(writer, metrics.clone()), calls, metrics)
    }

    #[tokio::test]
    async fn valid_payload_is_persisted() {
        let (saver, calls, metrics) = saver_with(Behavior::Succeed);
        let payload = serde_json::to_vec(&test_order("b563feb7b2b84b6test")).unwrap();

        saver.process(&payload).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.orders_persisted.get(), 1);
        assert_eq!(metrics.persist_duration.get_sample_count(), 1);
    }

    #[tokio::test]
    async fn garbage_payload_never_reaches_storage() {
        let (saver, calls, metrics) = saver_with(Behavior::Succeed);

        let err = saver.process(b"{not json").await.unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            metrics.persist_failures.with_label_values(&["decode"]).get(),
            1
        );
    }

    #[tokio::test]
    async fn empty_payload_is_a_decode_failure() {
        let (saver, calls, _metrics) = saver_with(Behavior::Succeed);

        let err = saver.process(b"").await.unwrap_err();

        assert!(matches!(err, IngestError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_order_is_reported_as_duplicate() {
        let (saver, _calls, metrics) = saver_with(Behavior::Duplicate);
        let payload = serde_json::to_vec(&test_order("b563feb7b2b84b6test")).unwrap();

        let err = saver.process(&payload).await.unwrap_err();

        assert!(err.is_duplicate());
        assert_eq!(metrics.duplicate_orders.get(), 1);
        assert_eq!(metrics.orders_persisted.get(), 0);
    }

    #[tokio::test]
    async fn storage_failure_is_counted_and_propagated() {
        let (saver, _calls, metrics) = saver_with(Behavior::Fail);
        let payload = serde_json::to_vec(&test_order("b563feb7b2b84b6test")).unwrap();

        let err = saver.process(&payload).await.unwrap_err();

        assert!(!err.is_duplicate());
        assert!(matches!(err, IngestError::Persist(_)));
        assert_eq!(
            metrics
                .persist_failures
                .with_label_values(&["storage"])
                .get(),
            1
        );
    }
}
