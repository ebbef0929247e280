use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::courier::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    RiderAssigned,
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Legal forward edges of the order lifecycle. Dispatch itself only writes
    /// ready → rider_assigned → picked_up → delivered; the earlier edges and
    /// cancellation belong to the external order component.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Preparing)
                | (Confirmed, Cancelled)
                | (Preparing, Ready)
                | (Preparing, Cancelled)
                | (Ready, RiderAssigned)
                | (RiderAssigned, PickedUp)
                | (PickedUp, Delivered)
        )
    }

    /// The order-ready trigger may arrive while the external kitchen flow is
    /// anywhere before ready.
    pub fn can_mark_ready(self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Preparing
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    /// Addressing key for the customer's live channel.
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status: OrderStatus,
    pub restaurant_location: Option<GeoPoint>,
    pub customer_location: Option<GeoPoint>,
    pub delivery_address: String,
    pub items: Vec<LineItem>,
    pub total_cents: i64,
    pub delivery_fee_cents: i64,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Boundary record: dispatch only touches it to settle cash on delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount_cents: i64,
}
