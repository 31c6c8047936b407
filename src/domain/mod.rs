// ============================================================================
// Domain Layer - Order Aggregate
// ============================================================================
//
// The aggregate types and their field rules. Nothing in here touches the
// broker, the database or the cache; those layers consume these types
// through the capability traits they define themselves.
//
// ============================================================================

pub mod order;

pub use order::{Delivery, Order, OrderItem, Payment};

/// Builds a fully-populated valid order for tests in any module.
#[cfg(test)]
pub(crate) fn test_order(order_uid: &str) -> Order {
    use chrono::TimeZone;

    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".into(),
        entry: "WBIL".into(),
        delivery: Delivery {
            name: "Test Testov".into(),
            phone: "+9720000000".into(),
            zip: "2639809".into(),
            city: "Kiryat Mozkin".into(),
            address: "Ploshad Mira 15".into(),
            region: "Kraiot".into(),
            email: "test@gmail.com".into(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: "req-1".into(),
            currency: "USD".into(),
            provider: "wbpay".into(),
            amount: 1817,
            payment_dt: 1_637_907_727,
            bank: "alpha".into(),
            delivery_cost: 1500,
            goods_total: 317,
            custom_fee: 0,
        },
        items: vec![OrderItem {
            chrt_id: 9_934_930,
            track_number: "WBILMTESTTRACK".into(),
            price: 453,
            rid: "ab4219087a764ae0btest".into(),
            name: "Mascaras".into(),
            sale: 30,
            size: "0".into(),
            total_price: 317,
            nm_id: 2_389_212,
            brand: "Vivienne Sabo".into(),
            status: 202,
        }],
        locale: "en".into(),
        internal_signature: "sig".into(),
        customer_id: "test".into(),
        delivery_service: "meest".into(),
        shard_key: "9".into(),
        sm_id: 99,
        date_created: chrono::Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
        oof_shard: "1".into(),
    }
}
