// ============================================================================
// Cached Order Reader
// ============================================================================
// Cache-aside decorator around a storage `OrderReader`. Lookups check the
// cache first; a miss falls through to storage and populates the cache on
// the way back. Failed storage reads, including not-found, leave the cache
// untouched. Concurrent misses for the same key may each query storage;
// last writer wins and every racer converges on the same stored value.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::OrderCache;
use crate::domain::Order;
use crate::metrics::Metrics;
use crate::storage::{OrderReader, StorageError};

pub struct CachedOrderReader<R, C> {
    storage: R,
    cache: C,
    metrics: Arc<Metrics>,
}

impl<R, C> CachedOrderReader<R, C>
where
    R: OrderReader,
    C: OrderCache,
{
    pub fn new(storage: R, cache: C, metrics: Arc<Metrics>) -> Self {
        Self {
            storage,
            cache,
            metrics,
        }
    }
}

#[async_trait]
impl<R, C> OrderReader for CachedOrderReader<R, C>
where
    R: OrderReader,
    C: OrderCache,
{
    async fn get_order_by_uid(&self, order_uid: &str) -> Result<Order, StorageError> {
        if let Some(order) = self.cache.get(order_uid).await {
            self.metrics.record_cache_lookup(true);
            debug!(order_uid = %order_uid, "order served from cache");
            return Ok(order);
        }

        self.metrics.record_cache_lookup(false);
        let order = self.storage.get_order_by_uid(order_uid).await?;
        self.cache.put(order.clone()).await;
        debug!(order_uid = %order_uid, "order loaded from storage and cached");

        Ok(order)
    }
}
