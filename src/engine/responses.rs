use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{dispatch, notify_order_status};
use crate::error::AppError;
use crate::models::courier::CourierStatus;
use crate::models::dispatch::{Delivery, DeliveryStatus, DispatchRequest, DispatchStatus};
use crate::models::order::OrderStatus;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone)]
pub enum RespondOutcome {
    Accepted { delivery: Delivery },
    Rejected,
}

/// Apply a courier's answer to an offer. Stale, duplicate, or foreign answers
/// come back InvalidState without mutating anything.
pub async fn respond(
    state: &Arc<AppState>,
    request_id: Uuid,
    courier_id: Uuid,
    action: CourierAction,
) -> Result<RespondOutcome, AppError> {
    let request = state
        .store
        .request(request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("request {request_id} not found")))?;

    if request.courier_id != courier_id {
        return Err(AppError::InvalidState(
            "request belongs to another courier".to_string(),
        ));
    }
    if request.status != DispatchStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "request is already {:?}",
            request.status
        )));
    }

    match action {
        CourierAction::Accept => accept(state, request).await,
        CourierAction::Reject => reject(state, request).await,
    }
}

async fn reject(
    state: &Arc<AppState>,
    request: DispatchRequest,
) -> Result<RespondOutcome, AppError> {
    if !state
        .store
        .resolve_request_if_pending(request.id, DispatchStatus::Rejected)
        .await?
    {
        return Err(AppError::InvalidState(
            "request was already resolved".to_string(),
        ));
    }

    state
        .metrics
        .requests_resolved_total
        .with_label_values(&["rejected"])
        .inc();
    info!(request_id = %request.id, order_id = %request.order_id, courier_id = %request.courier_id, "offer rejected; re-dispatching");

    dispatch::spawn_cycle(state.clone(), request.order_id);
    Ok(RespondOutcome::Rejected)
}

/// Two conditional writes decide the winner: first the request row
/// (pending → accepted), then the order row (ready → rider_assigned). A
/// courier whose request wins the first write but loses the second raced a
/// sibling accept; its request is re-marked expired and the action fails.
async fn accept(
    state: &Arc<AppState>,
    request: DispatchRequest,
) -> Result<RespondOutcome, AppError> {
    if !state
        .store
        .resolve_request_if_pending(request.id, DispatchStatus::Accepted)
        .await?
    {
        return Err(AppError::InvalidState(
            "request was already resolved".to_string(),
        ));
    }

    if !state
        .store
        .advance_order(request.order_id, OrderStatus::Ready, OrderStatus::RiderAssigned)
        .await?
    {
        state
            .store
            .set_request_status(request.id, DispatchStatus::Expired)
            .await?;
        state
            .metrics
            .requests_resolved_total
            .with_label_values(&["expired"])
            .inc();
        return Err(AppError::InvalidState(
            "order is no longer available".to_string(),
        ));
    }

    state
        .metrics
        .requests_resolved_total
        .with_label_values(&["accepted"])
        .inc();

    let delivery = Delivery {
        id: Uuid::new_v4(),
        order_id: request.order_id,
        courier_id: request.courier_id,
        status: DeliveryStatus::Assigned,
        picked_up_at: None,
        delivered_at: None,
        created_at: Utc::now(),
    };
    state.store.insert_delivery(delivery.clone()).await?;
    state
        .store
        .set_courier_status(request.courier_id, CourierStatus::Busy)
        .await?;

    let expired_siblings = state
        .store
        .expire_other_pending(request.order_id, request.id)
        .await?;

    info!(
        request_id = %request.id,
        order_id = %request.order_id,
        courier_id = %request.courier_id,
        expired_siblings,
        "offer accepted"
    );

    push_update(state, request.order_id, request.courier_id).await;
    Ok(RespondOutcome::Accepted { delivery })
}

/// Courier confirms pickup at the restaurant.
pub async fn mark_picked_up(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    courier_id: Uuid,
) -> Result<Delivery, AppError> {
    let delivery = owned_delivery(state, delivery_id, courier_id).await?;

    let now = Utc::now();
    if !state
        .store
        .advance_delivery(
            delivery.id,
            courier_id,
            DeliveryStatus::Assigned,
            DeliveryStatus::PickedUp,
            now,
        )
        .await?
    {
        return Err(AppError::InvalidState(format!(
            "delivery is {:?}, cannot pick up",
            delivery.status
        )));
    }

    mirror_order(state, delivery.order_id, OrderStatus::RiderAssigned, OrderStatus::PickedUp).await?;

    info!(delivery_id = %delivery.id, order_id = %delivery.order_id, "order picked up");
    push_update(state, delivery.order_id, courier_id).await;

    refreshed(state, delivery_id).await
}

/// Courier confirms handover to the customer. Finalizes cash-on-delivery and
/// frees the courier.
pub async fn mark_delivered(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    courier_id: Uuid,
) -> Result<Delivery, AppError> {
    let delivery = owned_delivery(state, delivery_id, courier_id).await?;

    let now = Utc::now();
    if !state
        .store
        .advance_delivery(
            delivery.id,
            courier_id,
            DeliveryStatus::PickedUp,
            DeliveryStatus::Delivered,
            now,
        )
        .await?
    {
        return Err(AppError::InvalidState(format!(
            "delivery is {:?}, cannot deliver",
            delivery.status
        )));
    }

    mirror_order(state, delivery.order_id, OrderStatus::PickedUp, OrderStatus::Delivered).await?;

    if state.store.settle_cash_payment(delivery.order_id).await? {
        info!(order_id = %delivery.order_id, "cash payment settled on delivery");
    }
    state
        .store
        .set_courier_status(courier_id, CourierStatus::Available)
        .await?;

    info!(delivery_id = %delivery.id, order_id = %delivery.order_id, "order delivered");
    push_update(state, delivery.order_id, courier_id).await;

    refreshed(state, delivery_id).await
}

async fn owned_delivery(
    state: &Arc<AppState>,
    delivery_id: Uuid,
    courier_id: Uuid,
) -> Result<Delivery, AppError> {
    let delivery = state
        .store
        .delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

    if delivery.courier_id != courier_id {
        return Err(AppError::InvalidState(
            "delivery belongs to another courier".to_string(),
        ));
    }
    Ok(delivery)
}

async fn mirror_order(
    state: &Arc<AppState>,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), AppError> {
    if !state.store.advance_order(order_id, from, to).await? {
        // The delivery row already moved; the order row disagreeing is an
        // operational anomaly, not a reason to fail the courier's action.
        warn!(order_id = %order_id, ?from, ?to, "order status mirror skipped; row not in expected state");
    }
    Ok(())
}

async fn refreshed(state: &Arc<AppState>, delivery_id: Uuid) -> Result<Delivery, AppError> {
    state
        .store
        .delivery(delivery_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
}

async fn push_update(state: &Arc<AppState>, order_id: Uuid, courier_id: Uuid) {
    let order = match state.store.order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(order_id = %order_id, "cannot notify: order missing");
            return;
        }
        Err(err) => {
            warn!(order_id = %order_id, error = %err, "cannot notify: store read failed");
            return;
        }
    };
    let courier_name = match state.store.courier(courier_id).await {
        Ok(courier) => courier.map(|c| c.name),
        Err(_) => None,
    };
    notify_order_status(state, &order, courier_name);
}
