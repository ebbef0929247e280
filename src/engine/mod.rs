pub mod dispatch;
pub mod matcher;
pub mod responses;

#[cfg(test)]
pub mod test_support;

use chrono::Utc;

use crate::models::message::PushMessage;
use crate::models::order::Order;
use crate::registry::Role;
use crate::state::AppState;

/// Best-effort status fan-out to the order's customer and restaurant. Pushed
/// only after the store state has actually changed; a missed push is fine,
/// tracking reads expose the same state.
pub fn notify_order_status(state: &AppState, order: &Order, courier_name: Option<String>) {
    let update = PushMessage::OrderStatusUpdate {
        order_id: order.id,
        status: order.status,
        courier_name,
        timestamp: Utc::now(),
    };

    state
        .registry
        .send(Role::Customer, order.customer_id, &update);
    state
        .registry
        .send(Role::Restaurant, order.restaurant_id, &update);
}
