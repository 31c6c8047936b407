// ============================================================================
// Cache - In-process order cache
// ============================================================================
// A keyed cache for fully persisted orders, sitting in front of the storage
// read path. The trait keeps the read path testable and leaves room for a
// different backing store without touching the HTTP layer.

pub mod memory;
pub mod reader;

pub use memory::InMemoryOrderCache;
pub use reader::CachedOrderReader;

use async_trait::async_trait;

use crate::domain::Order;

/// Get/put access to cached orders. Implementations are in-process and
/// infallible: a miss is `None`, never an error.
#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Returns a copy of the cached order, if present.
    async fn get(&self, order_uid: &str) -> Option<Order>;

    /// Stores a copy of the order under its `order_uid`. An existing entry
    /// for the same key is replaced.
    async fn put(&self, order: Order);
}
