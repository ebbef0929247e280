use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{LineItem, OrderStatus};

/// Everything the server pushes over a live channel. The poll endpoint reuses
/// the same shapes, so the accept/reject contract is transport-independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushMessage {
    NewOrderRequest {
        request_id: Uuid,
        order_id: Uuid,
        restaurant_name: String,
        items: Vec<LineItem>,
        customer_name: String,
        delivery_address: String,
        /// Straight-line km from the courier to the restaurant, rounded.
        distance_km: f64,
        distance_to_customer_km: Option<f64>,
        match_score: f64,
        expires_at: DateTime<Utc>,
    },
    OrderStatusUpdate {
        order_id: Uuid,
        status: OrderStatus,
        courier_name: Option<String>,
        timestamp: DateTime<Utc>,
    },
}
