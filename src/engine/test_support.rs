use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::models::courier::{Courier, CourierStatus, GeoPoint};
use crate::models::order::{LineItem, Order, OrderStatus, Payment, PaymentMethod, PaymentStatus};
use crate::state::AppState;

/// State with millisecond offer timeouts so watcher tests run fast.
pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(DispatchConfig {
        offer_timeout: Duration::from_millis(20),
        watcher_grace: Duration::from_millis(10),
        fallback_location: GeoPoint {
            lat: 16.87,
            lng: 96.20,
        },
    }))
}

/// A ready order at the worked-example coordinates: restaurant (16.80, 96.15),
/// customer (16.90, 96.25).
pub fn order_fixture() -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        restaurant_id: Uuid::new_v4(),
        restaurant_name: "Golden Bowl".to_string(),
        customer_id: Uuid::new_v4(),
        customer_name: "Aye Chan".to_string(),
        status: OrderStatus::Ready,
        restaurant_location: Some(GeoPoint {
            lat: 16.80,
            lng: 96.15,
        }),
        customer_location: Some(GeoPoint {
            lat: 16.90,
            lng: 96.25,
        }),
        delivery_address: "12 Anawrahta Rd, Yangon".to_string(),
        items: vec![
            LineItem {
                name: "Mohinga".to_string(),
                quantity: 2,
            },
            LineItem {
                name: "Tea Leaf Salad".to_string(),
                quantity: 1,
            },
        ],
        total_cents: 12_500,
        delivery_fee_cents: 1_500,
        city: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn courier_fixture(lat: f64, lng: f64) -> Courier {
    Courier {
        id: Uuid::new_v4(),
        actor_id: Uuid::new_v4(),
        name: "Min Thu".to_string(),
        location: Some(GeoPoint { lat, lng }),
        status: CourierStatus::Available,
        city: None,
        updated_at: Utc::now(),
    }
}

pub fn cash_payment(order_id: Uuid, amount_cents: i64) -> Payment {
    Payment {
        order_id,
        method: PaymentMethod::Cash,
        status: PaymentStatus::Pending,
        amount_cents,
    }
}
