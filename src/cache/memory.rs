// ============================================================================
// In-Memory Order Cache
// ============================================================================
// A map guarded by a single reader/writer lock. Readers proceed in parallel;
// a writer excludes everyone. Entries are never evicted: the map grows with
// the set of distinct orders read, which is acceptable for this service's
// working set. Anything beyond that needs a bounded backend behind the same
// trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::OrderCache;
use crate::domain::Order;

#[derive(Default)]
pub struct InMemoryOrderCache {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderCache for InMemoryOrderCache {
    async fn get(&self, order_uid: &str) -> Option<Order> {
        self.orders.read().await.get(order_uid).cloned()
    }

    async fn put(&self, order: Order) {
        self.orders
            .write()
            .await
            .insert(order.order_uid.clone(), order);
    }
}
