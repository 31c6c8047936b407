// ============================================================================
// Postgres Storage Backend
// ============================================================================
// Persists the order aggregate across four tables inside a single
// transaction and reassembles it with four reads. Every operation runs
// under the configured deadline; when the deadline fires mid-write the
// open transaction is dropped, which rolls it back.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::{OrderReader, OrderWriter, StorageError};
use crate::domain::{Delivery, Order, OrderItem, Payment};

// ============================================================================
// SQL statements
// ============================================================================
// Plain-text statements bound at runtime; sqlx prepares each one once per
// connection and reuses the cached prepared statement afterwards.

const INSERT_ORDER: &str = "\
    INSERT INTO orders (order_uid, track_number, entry, locale, \
        internal_signature, customer_id, delivery_service, shardkey, sm_id, \
        date_created, oof_shard) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_DELIVERY: &str = "\
    INSERT INTO deliveries (order_uid, name, phone, zip, city, address, \
        region, email) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

const INSERT_PAYMENT: &str = "\
    INSERT INTO payments (order_uid, transaction, request_id, currency, \
        provider, amount, payment_dt, bank, delivery_cost, goods_total, \
        custom_fee) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";

const INSERT_ITEM: &str = "\
    INSERT INTO items (order_uid, chrt_id, track_number, price, rid, name, \
        sale, size, total_price, nm_id, brand, status) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

const SELECT_ORDER: &str = "\
    SELECT order_uid, track_number, entry, locale, internal_signature, \
        customer_id, delivery_service, shardkey, sm_id, date_created, \
        oof_shard \
    FROM orders WHERE order_uid = $1";

const SELECT_DELIVERY: &str = "\
    SELECT name, phone, zip, city, address, region, email \
    FROM deliveries WHERE order_uid = $1";

const SELECT_PAYMENT: &str = "\
    SELECT transaction, request_id, currency, provider, amount, payment_dt, \
        bank, delivery_cost, goods_total, custom_fee \
    FROM payments WHERE order_uid = $1";

const SELECT_ITEMS: &str = "\
    SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, \
        nm_id, brand, status \
    FROM items WHERE order_uid = $1 ORDER BY id";

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_uid: String,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    name: String,
    phone: String,
    zip: String,
    city: String,
    address: String,
    region: String,
    email: String,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    transaction: String,
    request_id: String,
    currency: String,
    provider: String,
    amount: i64,
    payment_dt: i64,
    bank: String,
    delivery_cost: i64,
    goods_total: i64,
    custom_fee: i64,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    chrt_id: i64,
    track_number: String,
    price: i64,
    rid: String,
    name: String,
    sale: i32,
    size: String,
    total_price: i64,
    nm_id: i64,
    brand: String,
    status: i32,
}

fn assemble_order(
    order: OrderRow,
    delivery: DeliveryRow,
    payment: PaymentRow,
    items: Vec<ItemRow>,
) -> Order {
    Order {
        order_uid: order.order_uid,
        track_number: order.track_number,
        entry: order.entry,
        delivery: Delivery {
            name: delivery.name,
            phone: delivery.phone,
            zip: delivery.zip,
            city: delivery.city,
            address: delivery.address,
            region: delivery.region,
            email: delivery.email,
        },
        payment: Payment {
            transaction: payment.transaction,
            request_id: payment.request_id,
            currency: payment.currency,
            provider: payment.provider,
            amount: payment.amount,
            payment_dt: payment.payment_dt,
            bank: payment.bank,
            delivery_cost: payment.delivery_cost,
            goods_total: payment.goods_total,
            custom_fee: payment.custom_fee,
        },
        items: items
            .into_iter()
            .map(|item| OrderItem {
                chrt_id: item.chrt_id,
                track_number: item.track_number,
                price: item.price,
                rid: item.rid,
                name: item.name,
                sale: item.sale,
                size: item.size,
                total_price: item.total_price,
                nm_id: item.nm_id,
                brand: item.brand,
                status: item.status,
            })
            .collect(),
        locale: order.locale,
        internal_signature: order.internal_signature,
        customer_id: order.customer_id,
        delivery_service: order.delivery_service,
        shard_key: order.shardkey,
        sm_id: order.sm_id,
        date_created: order.date_created,
        oof_shard: order.oof_shard,
    }
}

// ============================================================================
// PgStorage
// ============================================================================

/// Postgres-backed order storage. Cloning is cheap, the connection pool is
/// shared.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
    op_timeout: Duration,
}

impl PgStorage {
    /// Connects the pool and verifies the database is reachable.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        op_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(op_timeout)
            .connect(database_url)
            .await?;

        Ok(Self { pool, op_timeout })
    }

    /// Applies the embedded migrations from `./migrations`.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    /// Bounds `fut` by the configured per-operation deadline. A write future
    /// dropped at the deadline takes its open transaction with it, so a
    /// timed-out save leaves no partial rows behind.
    async fn with_deadline<T, F>(&self, op: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout {
                op,
                timeout: self.op_timeout,
            })?
    }

    async fn insert_aggregate(&self, order: &Order) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(|e| StorageError::Query {
            op: "begin transaction",
            source: e,
        })?;

        self.insert_order_row(&mut tx, order).await?;
        self.insert_delivery_row(&mut tx, order).await?;
        self.insert_payment_row(&mut tx, order).await?;
        for item in &order.items {
            self.insert_item_row(&mut tx, &order.order_uid, item).await?;
        }

        tx.commit().await.map_err(|e| StorageError::Query {
            op: "commit transaction",
            source: e,
        })
    }

    async fn insert_order_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), StorageError> {
        sqlx::query(INSERT_ORDER)
            .bind(&order.order_uid)
            .bind(&order.track_number)
            .bind(&order.entry)
            .bind(&order.locale)
            .bind(&order.internal_signature)
            .bind(&order.customer_id)
            .bind(&order.delivery_service)
            .bind(&order.shard_key)
            .bind(order.sm_id)
            .bind(order.date_created)
            .bind(&order.oof_shard)
            .execute(&mut **tx)
            .await
            .map(|_| ())
            .map_err(|e| map_insert_error("insert order", &order.order_uid, e))
    }

    async fn insert_delivery_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), StorageError> {
        sqlx::query(INSERT_DELIVERY)
            .bind(&order.order_uid)
            .bind(&order.delivery.name)
            .bind(&order.delivery.phone)
            .bind(&order.delivery.zip)
            .bind(&order.delivery.city)
            .bind(&order.delivery.address)
            .bind(&order.delivery.region)
            .bind(&order.delivery.email)
            .execute(&mut **tx)
            .await
            .map(|_| ())
            .map_err(|e| map_insert_error("insert delivery", &order.order_uid, e))
    }

    async fn insert_payment_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), StorageError> {
        sqlx::query(INSERT_PAYMENT)
            .bind(&order.order_uid)
            .bind(&order.payment.transaction)
            .bind(&order.payment.request_id)
            .bind(&order.payment.currency)
            .bind(&order.payment.provider)
            .bind(order.payment.amount)
            .bind(order.payment.payment_dt)
            .bind(&order.payment.bank)
            .bind(order.payment.delivery_cost)
            .bind(order.payment.goods_total)
            .bind(order.payment.custom_fee)
            .execute(&mut **tx)
            .await
            .map(|_| ())
            .map_err(|e| map_insert_error("insert payment", &order.order_uid, e))
    }

    async fn insert_item_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order_uid: &str,
        item: &OrderItem,
    ) -> Result<(), StorageError> {
        sqlx::query(INSERT_ITEM)
            .bind(order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut **tx)
            .await
            .map(|_| ())
            .map_err(|e| map_insert_error("insert item", order_uid, e))
    }

    async fn fetch_aggregate(&self, order_uid: &str) -> Result<Order, StorageError> {
        let order: OrderRow = sqlx::query_as(SELECT_ORDER)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query {
                op: "fetch order",
                source: e,
            })?
            .ok_or_else(|| StorageError::NotFound {
                order_uid: order_uid.to_string(),
            })?;

        let delivery: DeliveryRow = sqlx::query_as(SELECT_DELIVERY)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query {
                op: "fetch delivery",
                source: e,
            })?
            .ok_or_else(|| StorageError::Incomplete {
                order_uid: order_uid.to_string(),
                missing: "delivery",
            })?;

        let payment: PaymentRow = sqlx::query_as(SELECT_PAYMENT)
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query {
                op: "fetch payment",
                source: e,
            })?
            .ok_or_else(|| StorageError::Incomplete {
                order_uid: order_uid.to_string(),
                missing: "payment",
            })?;

        let items: Vec<ItemRow> = sqlx::query_as(SELECT_ITEMS)
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query {
                op: "fetch items",
                source: e,
            })?;

        // An order committed without items is impossible, only a full
        // aggregate ever reaches the transaction.
        if items.is_empty() {
            return Err(StorageError::Incomplete {
                order_uid: order_uid.to_string(),
                missing: "items",
            });
        }

        Ok(assemble_order(order, delivery, payment, items))
    }
}

/// Maps a primary-key collision on any of the aggregate tables to
/// `Duplicate`; everything else stays a query error.
fn map_insert_error(op: &'static str, order_uid: &str, err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Duplicate {
            order_uid: order_uid.to_string(),
        },
        _ => StorageError::Query { op, source: err },
    }
}

#[async_trait]
impl OrderWriter for PgStorage {
    async fn save_order(&self, order: &Order) -> Result<(), StorageError> {
        self.with_deadline("save order", self.insert_aggregate(order))
            .await
    }
}

#[async_trait]
impl OrderReader for PgStorage {
    async fn get_order_by_uid(&self, order_uid: &str) -> Result<Order, StorageError> {
        self.with_deadline("get order", self.fetch_aggregate(order_uid))
            .await
    }
}
