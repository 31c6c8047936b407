// ============================================================================
// Kafka Publisher
// ============================================================================
// Wrapper around rdkafka's FutureProducer. Each publish call waits for the
// per-message acknowledgment, so the HTTP handler reports an honest outcome
// to the client. No retry happens here; retry policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::debug;

use super::{MessagePublisher, PublishError};
use crate::config::KafkaConfig;

/// Upper bound on the wait for a broker acknowledgment. Matches the
/// producer's own `message.timeout.ms`, after which librdkafka fails the
/// delivery anyway.
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaPublisher {
    producer: FutureProducer,
}

impl KafkaPublisher {
    /// Creates the producer client. This validates the configuration but
    /// does not contact the broker; unreachable brokers surface on publish.
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    /// Waits until every in-flight message is delivered or failed. Called
    /// once during shutdown.
    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(Timeout::After(timeout))
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);

        match self.producer.send(record, Timeout::After(ACK_TIMEOUT)).await {
            Ok(_) => {
                debug!(
                    topic = %topic,
                    bytes = payload.len(),
                    "broker acknowledged message"
                );
                Ok(())
            }
            Err((KafkaError::Canceled, _)) => Err(PublishError::AckDropped),
            Err((e, _)) => Err(PublishError::Delivery(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_builds_from_config_without_a_broker() {
        let config = KafkaConfig {
            brokers: vec!["localhost:9092".into()],
            topic: "orders".into(),
            group_id: "orderflow".into(),
        };

        assert!(KafkaPublisher::new(&config).is_ok());
    }

    #[test]
    fn publish_errors_have_distinct_messages() {
        let delivery = PublishError::Delivery(KafkaError::Canceled);
        let dropped = PublishError::AckDropped;

        assert_eq!(delivery.to_string(), "broker rejected the message");
        assert_eq!(
            dropped.to_string(),
            "delivery acknowledgment dropped before completion"
        );
    }
}
