// ============================================================================
// Kafka Order Consumer
// ============================================================================
// The single long-lived consumer-group member that drains the order topic.
// Offsets are stored manually, only after the processor has dealt with the
// message; librdkafka then commits stored offsets in the background every
// five seconds, and `run` commits them once more synchronously on shutdown.
// A message whose processing failed is never offset-stored, so the broker
// redelivers it after a restart or rebalance.

use std::sync::Arc;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::types::RDKafkaErrorCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::metrics::Metrics;
use crate::service::{IngestError, OrderProcessor};

pub struct OrderConsumer<P> {
    consumer: StreamConsumer,
    processor: P,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
}

impl<P: OrderProcessor> OrderConsumer<P> {
    /// Creates the group member and subscribes it to the order topic.
    /// Partition assignment happens lazily once the loop starts polling.
    pub fn new(
        config: &KafkaConfig,
        processor: P,
        metrics: Arc<Metrics>,
        shutdown: CancellationToken,
    ) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("group.id", config.group_id.as_str())
            .set("session.timeout.ms", "7000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            consumer,
            processor,
            metrics,
            shutdown,
        })
    }

    /// Polls until the shutdown token fires, then flushes stored offsets and
    /// closes the group membership. Processing failures never end the loop.
    pub async fn run(self) {
        info!("consumer loop started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("consumer shutting down");
                    break;
                }
                received = self.consumer.recv() => match received {
                    Ok(message) => self.handle_message(&message).await,
                    Err(e) => {
                        error!(error = %e, "failed to receive from broker");
                    }
                },
            }
        }

        self.commit_stored_offsets();
        // Dropping the StreamConsumer afterwards leaves the group, so every
        // offset stored before shutdown is committed before the connection
        // closes.
    }

    async fn handle_message(&self, message: &BorrowedMessage<'_>) {
        self.metrics.orders_consumed.inc();
        let payload = message.payload().unwrap_or_default();

        let outcome = self.processor.process(payload).await;
        match &outcome {
            Ok(()) => {
                debug!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "message processed"
                );
            }
            Err(err) if err.is_duplicate() => {
                warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "order already persisted, treating redelivery as processed"
                );
            }
            Err(err) => {
                error!(
                    error = %err,
                    partition = message.partition(),
                    offset = message.offset(),
                    "message left uncommitted for redelivery"
                );
            }
        }

        if outcome_allows_commit(&outcome) {
            self.store_offset(message);
        }
    }

    fn store_offset(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.store_offset_from_message(message) {
            error!(
                error = %e,
                partition = message.partition(),
                offset = message.offset(),
                "failed to store offset"
            );
        }
    }

    fn commit_stored_offsets(&self) {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => info!("final offset commit complete"),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("no stored offsets to commit");
            }
            Err(e) => error!(error = %e, "final offset commit failed"),
        }
    }
}

/// A message's offset may be stored when it was persisted now or found to be
/// persisted already. Every other outcome leaves the offset alone so the
/// broker redelivers the message.
fn outcome_allows_commit(outcome: &Result<(), IngestError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(err) => err.is_duplicate(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::storage::StorageError;

    struct NoopProcessor;

    #[async_trait]
    impl OrderProcessor for NoopProcessor {
        async fn process(&self, _payload: &[u8]) -> Result<(), IngestError> {
            Ok(())
        }
    }

    fn test_config() -> KafkaConfig {
        KafkaConfig {
            brokers: vec!["localhost:9092".into()],
            topic: "orders".into(),
            group_id: "orderflow".into(),
        }
    }

    #[tokio::test]
    async fn consumer_builds_and_subscribes_without_a_broker() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let consumer = OrderConsumer::new(
            &test_config(),
            NoopProcessor,
            metrics,
            CancellationToken::new(),
        );

        assert!(consumer.is_ok());
    }

    #[test]
    fn success_allows_offset_store() {
        assert!(outcome_allows_commit(&Ok(())));
    }

    #[test]
    fn duplicate_persist_counts_as_processed() {
        let outcome = Err(IngestError::Persist(StorageError::Duplicate {
            order_uid: "abc".into(),
        }));
        assert!(outcome_allows_commit(&outcome));
    }

    #[test]
    fn decode_failure_leaves_offset_unstored() {
        let bad_json = serde_json::from_slice::<crate::domain::Order>(b"not json").unwrap_err();
        let outcome = Err(IngestError::Decode(bad_json));
        assert!(!outcome_allows_commit(&outcome));
    }

    #[test]
    fn storage_failure_leaves_offset_unstored() {
        let outcome = Err(IngestError::Persist(StorageError::Timeout {
            op: "save order",
            timeout: std::time::Duration::from_secs(5),
        }));
        assert!(!outcome_allows_commit(&outcome));
    }
}
