use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::engine::dispatch;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::registry::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/courier/:actor_id", get(courier_ws))
        .route("/ws/customer/:id", get(customer_ws))
        .route("/ws/restaurant/:id", get(restaurant_ws))
}

async fn courier_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(actor_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Only known couriers get a channel; replay needs the courier record.
    let courier = state
        .store
        .courier_by_actor(actor_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no courier for actor {actor_id}")))?;

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, state, Role::Courier, actor_id, Some(courier))
    }))
}

async fn customer_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Customer, id, None))
}

async fn restaurant_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, Role::Restaurant, id, None))
}

/// Bridges the registry channel onto the socket. The registry only ever sees
/// the channel; socket lifecycle stays in here. For couriers, catch-up replay
/// runs after the channel is registered so no pending offer can slip by.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    role: Role,
    id: Uuid,
    replay_for: Option<Courier>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state.registry.connect(role, id, tx);
    state
        .metrics
        .connected_clients
        .with_label_values(&[role.as_str()])
        .set(state.registry.connected(role) as i64);
    info!(role = role.as_str(), actor_id = %id, "websocket connected");

    if let Some(courier) = replay_for {
        let replay_state = state.clone();
        tokio::spawn(async move {
            dispatch::replay_pending(replay_state, courier).await;
        });
    }

    let send_task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        // Inbound traffic is ignored; actions arrive over the REST surface.
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.registry.disconnect(role, id);
    state
        .metrics
        .connected_clients
        .with_label_values(&[role.as_str()])
        .set(state.registry.connected(role) as i64);
    info!(role = role.as_str(), actor_id = %id, "websocket disconnected");
}
