use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::dispatch;
use crate::error::AppError;
use crate::models::courier::{Courier, CourierStatus, GeoPoint};
use crate::models::message::PushMessage;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier))
        .route("/couriers/:id/status", patch(update_status))
        .route("/couriers/:id/location", patch(update_location))
        .route("/couriers/:id/requests", get(pending_requests))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub actor_id: Option<Uuid>,
    pub location: Option<GeoPoint>,
    pub city: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let courier = Courier {
        id: Uuid::new_v4(),
        actor_id: payload.actor_id.unwrap_or_else(Uuid::new_v4),
        name: payload.name,
        location: payload.location,
        status: CourierStatus::Available,
        city: payload.city,
        updated_at: Utc::now(),
    };

    state.store.insert_courier(courier.clone()).await?;
    Ok(Json(courier))
}

/// Couriers toggle available/unavailable themselves; busy is owned by the
/// accept/deliver flow.
async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    if payload.status == CourierStatus::Busy {
        return Err(AppError::BadRequest(
            "status must be available or unavailable".to_string(),
        ));
    }

    if !state.store.set_courier_status(id, payload.status).await? {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    let courier = state
        .store
        .courier(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;
    Ok(Json(courier))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Courier>, AppError> {
    if !state.store.set_courier_location(id, payload.location).await? {
        return Err(AppError::NotFound(format!("courier {id} not found")));
    }

    let courier = state
        .store
        .courier(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;
    Ok(Json(courier))
}

/// Poll contract: the same offer payloads a live channel would have carried,
/// for clients without a persistent connection.
async fn pending_requests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PushMessage>>, AppError> {
    let courier = state
        .store
        .courier(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {id} not found")))?;

    let offers = dispatch::pending_offers(&state, &courier).await?;
    Ok(Json(offers))
}
