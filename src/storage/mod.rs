// ============================================================================
// STORAGE - Durable order persistence
// ============================================================================
// Capability traits for the write and read halves of order storage, plus the
// error taxonomy shared by every backend. Consumers depend on `OrderWriter`
// and `OrderReader` rather than on a concrete database client, which keeps
// the ingestion service and the HTTP read path testable with in-memory fakes.

pub mod postgres;

pub use postgres::PgStorage;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Order;

// ============================================================================
// Errors
// ============================================================================

/// Failures surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No order row exists for the requested identifier.
    #[error("order {order_uid} not found")]
    NotFound { order_uid: String },

    /// An order with the same identifier has already been persisted.
    #[error("order {order_uid} already exists")]
    Duplicate { order_uid: String },

    /// The order row exists but one of its child tables came back empty.
    /// A committed aggregate always carries delivery, payment and items, so
    /// this indicates corruption and is never exposed as `NotFound`.
    #[error("order {order_uid} is incomplete: no {missing} rows")]
    Incomplete {
        order_uid: String,
        missing: &'static str,
    },

    /// The operation did not finish within its deadline.
    #[error("storage operation '{op}' timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    /// Any other database failure.
    #[error("storage operation '{op}' failed")]
    Query {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::Duplicate { .. })
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Write half of order storage.
#[async_trait]
pub trait OrderWriter: Send + Sync {
    /// Persists the full order aggregate atomically. Either every row of the
    /// aggregate becomes visible or none of them do.
    async fn save_order(&self, order: &Order) -> Result<(), StorageError>;
}

/// Read half of order storage.
#[async_trait]
pub trait OrderReader: Send + Sync {
    /// Loads the full order aggregate for the given identifier.
    async fn get_order_by_uid(&self, order_uid: &str) -> Result<Order, StorageError>;
}
