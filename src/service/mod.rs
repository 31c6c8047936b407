// ============================================================================
// Service - Pipeline processing stages
// ============================================================================
// Logic that sits between transport and storage. The consumer hands every
// raw payload to an `OrderProcessor`; the concrete `OrderSaver` decodes it
// and writes the order through the storage capability traits.

pub mod saver;

pub use saver::OrderSaver;

use async_trait::async_trait;
use thiserror::Error;

use crate::storage::StorageError;

// ============================================================================
// Errors
// ============================================================================

/// Failures while turning a raw message into a persisted order.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload is not a valid order document. Local to the message.
    #[error("failed to decode message payload")]
    Decode(#[source] serde_json::Error),

    /// Decoding succeeded but the storage write failed.
    #[error("failed to persist order")]
    Persist(#[source] StorageError),
}

impl IngestError {
    /// True when the order behind this message is already in storage, which
    /// happens when the broker redelivers after a crash between persist and
    /// offset commit.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestError::Persist(e) if e.is_duplicate())
    }
}

// ============================================================================
// Capability trait
// ============================================================================

/// Handles one raw message pulled off the topic.
#[async_trait]
pub trait OrderProcessor: Send + Sync {
    async fn process(&self, payload: &[u8]) -> Result<(), IngestError>;
}
