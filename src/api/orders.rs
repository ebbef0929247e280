use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::responses::{self, CourierAction, RespondOutcome};
use crate::engine::{dispatch, notify_order_status};
use crate::error::AppError;
use crate::models::courier::GeoPoint;
use crate::models::dispatch::Delivery;
use crate::models::order::{
    LineItem, Order, OrderStatus, Payment, PaymentMethod, PaymentStatus,
};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(track_order))
        .route("/orders/:id/ready", post(mark_ready))
        .route("/requests/:id/respond", post(respond))
        .route("/deliveries/:id/pickup", post(pickup))
        .route("/deliveries/:id/deliver", post(deliver))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: Option<Uuid>,
    pub restaurant_name: String,
    pub restaurant_location: Option<GeoPoint>,
    pub customer_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_location: Option<GeoPoint>,
    pub delivery_address: String,
    pub items: Vec<LineItem>,
    pub total_cents: i64,
    #[serde(default)]
    pub delivery_fee_cents: i64,
    pub city: Option<String>,
    pub payment_method: PaymentMethod,
}

/// Stand-in for the external order component: seeds an order (and its payment
/// record) so the dispatch flow has something to work on.
async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    if payload.restaurant_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "restaurant_name cannot be empty".to_string(),
        ));
    }
    if payload.delivery_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "delivery_address cannot be empty".to_string(),
        ));
    }
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("items cannot be empty".to_string()));
    }

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        restaurant_id: payload.restaurant_id.unwrap_or_else(Uuid::new_v4),
        restaurant_name: payload.restaurant_name,
        customer_id: payload.customer_id.unwrap_or_else(Uuid::new_v4),
        customer_name: payload.customer_name,
        status: OrderStatus::Pending,
        restaurant_location: payload.restaurant_location,
        customer_location: payload.customer_location,
        delivery_address: payload.delivery_address,
        items: payload.items,
        total_cents: payload.total_cents,
        delivery_fee_cents: payload.delivery_fee_cents,
        city: payload.city,
        created_at: now,
        updated_at: now,
    };

    // Cash settles on delivery; anything else is captured up front.
    let payment = Payment {
        order_id: order.id,
        method: payload.payment_method,
        status: match payload.payment_method {
            PaymentMethod::Cash => PaymentStatus::Pending,
            PaymentMethod::Card => PaymentStatus::Paid,
        },
        amount_cents: order.total_cents,
    };

    state.store.insert_order(order.clone()).await?;
    state.store.insert_payment(payment).await?;
    Ok(Json(order))
}

#[derive(Serialize)]
struct TrackOrderResponse {
    order: Order,
    delivery: Option<Delivery>,
    payment: Option<Payment>,
}

async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TrackOrderResponse>, AppError> {
    let order = state
        .store
        .order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    let delivery = state.store.delivery_by_order(id).await?;
    let payment = state.store.payment_by_order(id).await?;

    Ok(Json(TrackOrderResponse {
        order,
        delivery,
        payment,
    }))
}

#[derive(Deserialize, Default)]
pub struct ReadyRequest {
    pub customer_location: Option<GeoPoint>,
}

/// Order-ready trigger: flips the order to ready and kicks off matching.
async fn mark_ready(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReadyRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .store
        .order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    if !order.status.can_mark_ready() {
        return Err(AppError::InvalidState(format!(
            "order is {:?}, cannot mark ready",
            order.status
        )));
    }

    if !state
        .store
        .mark_order_ready(id, payload.customer_location)
        .await?
    {
        return Err(AppError::InvalidState(
            "order is already past ready".to_string(),
        ));
    }

    let order = state
        .store
        .order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    notify_order_status(&state, &order, None);
    dispatch::spawn_cycle(state.clone(), id);

    Ok(Json(order))
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub courier_id: Uuid,
    pub action: CourierAction,
}

#[derive(Serialize)]
struct RespondResponse {
    request_id: Uuid,
    result: &'static str,
    delivery: Option<Delivery>,
}

async fn respond(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, AppError> {
    let outcome = responses::respond(&state, id, payload.courier_id, payload.action).await?;

    let (result, delivery) = match outcome {
        RespondOutcome::Accepted { delivery } => ("accepted", Some(delivery)),
        RespondOutcome::Rejected => ("rejected", None),
    };

    Ok(Json(RespondResponse {
        request_id: id,
        result,
        delivery,
    }))
}

#[derive(Deserialize)]
pub struct DeliveryActionRequest {
    pub courier_id: Uuid,
}

async fn pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliveryActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = responses::mark_picked_up(&state, id, payload.courier_id).await?;
    Ok(Json(delivery))
}

async fn deliver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeliveryActionRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = responses::mark_delivered(&state, id, payload.courier_id).await?;
    Ok(Json(delivery))
}
