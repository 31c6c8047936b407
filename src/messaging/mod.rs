// ============================================================================
// Messaging - Kafka publish/consume plumbing
// ============================================================================
// The write side of the pipeline. `MessagePublisher` is the capability the
// HTTP layer publishes through; `OrderConsumer` is the single long-lived
// group member that drains the topic into storage.

pub mod consumer;
pub mod producer;

pub use consumer::OrderConsumer;
pub use producer::KafkaPublisher;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Failures surfaced by a publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker reported a delivery failure for this message.
    #[error("broker rejected the message")]
    Delivery(#[source] KafkaError),

    /// The delivery acknowledgment never resolved because the producer was
    /// torn down first. Should not happen while the service is running.
    #[error("delivery acknowledgment dropped before completion")]
    AckDropped,
}

// ============================================================================
// Capability trait
// ============================================================================

/// Publishes an opaque payload to a topic and resolves only once the broker
/// acknowledged or rejected the delivery. Safe for concurrent use from many
/// request contexts; acknowledgments never cross between calls.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}
