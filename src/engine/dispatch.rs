use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::matcher::{self, Candidate};
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::dispatch::{DispatchRequest, DispatchStatus};
use crate::models::message::PushMessage;
use crate::models::order::{Order, OrderStatus};
use crate::registry::Role;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// An offer was delivered; a timeout watcher is running for it.
    Offered { request_id: Uuid, courier_id: Uuid },
    /// Nobody eligible right now. Reportable, not an error.
    NoCandidates,
    /// Every eligible courier was tried and none could be reached.
    Exhausted,
    /// The order resolved before this cycle ran; late watcher wakes end here.
    OrderNotReady,
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Offered { .. } => "offered",
            CycleOutcome::NoCandidates => "no_candidates",
            CycleOutcome::Exhausted => "exhausted",
            CycleOutcome::OrderNotReady => "order_not_ready",
        }
    }
}

/// Fire-and-forget matching cycle. Every trigger (order ready, rejection,
/// offer timeout) funnels through here so outcome accounting stays in one
/// place.
pub fn spawn_cycle(state: Arc<AppState>, order_id: Uuid) {
    tokio::spawn(async move {
        let start = Instant::now();
        match run_cycle(&state, order_id).await {
            Ok(outcome) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .dispatch_cycle_duration_seconds
                    .with_label_values(&[outcome.label()])
                    .observe(elapsed);
                state
                    .metrics
                    .dispatch_cycles_total
                    .with_label_values(&[outcome.label()])
                    .inc();

                match outcome {
                    CycleOutcome::Offered {
                        request_id,
                        courier_id,
                    } => {
                        info!(order_id = %order_id, request_id = %request_id, courier_id = %courier_id, "offer delivered");
                    }
                    CycleOutcome::NoCandidates => {
                        warn!(order_id = %order_id, "no eligible couriers; dispatch halts without assignment");
                    }
                    CycleOutcome::Exhausted => {
                        warn!(order_id = %order_id, "no courier reachable; offers remain pending for catch-up");
                    }
                    CycleOutcome::OrderNotReady => {
                        debug!(order_id = %order_id, "order no longer ready; cycle is a no-op");
                    }
                }
            }
            Err(err) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .dispatch_cycle_duration_seconds
                    .with_label_values(&["error"])
                    .observe(elapsed);
                state
                    .metrics
                    .dispatch_cycles_total
                    .with_label_values(&["error"])
                    .inc();
                // The order stays ready; a later trigger can retry.
                error!(order_id = %order_id, error = %err, "dispatch cycle failed");
            }
        }
    });
}

/// One matching round: anchor → candidates → exclusion → score → offer.
pub async fn run_cycle(state: &Arc<AppState>, order_id: Uuid) -> Result<CycleOutcome, AppError> {
    let order = state
        .store
        .order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status != OrderStatus::Ready {
        return Ok(CycleOutcome::OrderNotReady);
    }

    let fallback = state.dispatch.fallback_location;
    let pickup = order
        .restaurant_location
        .or(order.customer_location)
        .unwrap_or(fallback);
    if order.restaurant_location.is_none() {
        warn!(order_id = %order_id, "restaurant coordinates missing; using fallback pickup anchor");
    }

    let couriers = state.store.available_couriers(order.city.as_deref()).await?;
    let attempted = state.store.attempted_courier_ids(order_id).await?;
    let ranked = matcher::rank(pickup, order.customer_location, couriers, &attempted, fallback);

    if ranked.is_empty() {
        return Ok(CycleOutcome::NoCandidates);
    }

    for candidate in ranked {
        let request = DispatchRequest {
            id: Uuid::new_v4(),
            order_id,
            courier_id: candidate.courier.id,
            status: DispatchStatus::Pending,
            created_at: Utc::now(),
            expires_at: Utc::now()
                + ChronoDuration::from_std(state.dispatch.offer_timeout)
                    .unwrap_or_else(|_| ChronoDuration::seconds(60)),
        };

        if let Err(err) = state.store.insert_request(request.clone()).await {
            // "No candidate this step": skip, the next courier may still work.
            warn!(order_id = %order_id, courier_id = %candidate.courier.id, error = %err, "request creation failed; skipping candidate");
            continue;
        }

        let offer = build_offer(&order, &request, &candidate);
        if state
            .registry
            .send(Role::Courier, candidate.courier.actor_id, &offer)
            .is_delivered()
        {
            state
                .metrics
                .offers_total
                .with_label_values(&["delivered"])
                .inc();
            spawn_timeout_watcher(state.clone(), request.id, order_id);
            return Ok(CycleOutcome::Offered {
                request_id: request.id,
                courier_id: candidate.courier.id,
            });
        }

        // Unreachable courier: the request stays pending so replay/poll can
        // still surface it; move on to the next candidate.
        state
            .metrics
            .offers_total
            .with_label_values(&["undelivered"])
            .inc();
        debug!(order_id = %order_id, courier_id = %candidate.courier.id, "courier unreachable; trying next candidate");
    }

    Ok(CycleOutcome::Exhausted)
}

/// One-shot watcher per delivered offer. Becomes a no-op if the request
/// resolved before the wake; the expiry write itself is the check-and-set.
pub fn spawn_timeout_watcher(state: Arc<AppState>, request_id: Uuid, order_id: Uuid) {
    tokio::spawn(async move {
        tokio::time::sleep(state.dispatch.offer_timeout + state.dispatch.watcher_grace).await;

        match state
            .store
            .resolve_request_if_pending(request_id, DispatchStatus::Expired)
            .await
        {
            Ok(true) => {
                state
                    .metrics
                    .requests_resolved_total
                    .with_label_values(&["expired"])
                    .inc();
                info!(request_id = %request_id, order_id = %order_id, "offer timed out; re-dispatching");
                spawn_cycle(state, order_id);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(request_id = %request_id, error = %err, "timeout watcher could not check request");
            }
        }
    });
}

pub fn build_offer(order: &Order, request: &DispatchRequest, candidate: &Candidate) -> PushMessage {
    PushMessage::NewOrderRequest {
        request_id: request.id,
        order_id: order.id,
        restaurant_name: order.restaurant_name.clone(),
        items: order.items.clone(),
        customer_name: order.customer_name.clone(),
        delivery_address: order.delivery_address.clone(),
        distance_km: matcher::round2(candidate.distance_to_restaurant_km),
        distance_to_customer_km: candidate.distance_to_customer_km.map(matcher::round2),
        match_score: matcher::round2(candidate.score),
        expires_at: request.expires_at,
    }
}

/// Offer payloads for every still-pending request addressed to this courier,
/// with distances recomputed from the courier's current position. Shared by
/// the poll endpoint and the reconnect replay.
pub async fn pending_offers(
    state: &AppState,
    courier: &Courier,
) -> Result<Vec<PushMessage>, AppError> {
    let requests = state.store.pending_requests_for_courier(courier.id).await?;
    let fallback = state.dispatch.fallback_location;

    let mut offers = Vec::with_capacity(requests.len());
    for request in requests {
        let Some(order) = state.store.order(request.order_id).await? else {
            warn!(request_id = %request.id, "pending request references a missing order");
            continue;
        };
        let pickup = order
            .restaurant_location
            .or(order.customer_location)
            .unwrap_or(fallback);
        let candidate =
            matcher::score_courier(pickup, order.customer_location, courier.clone(), fallback);
        offers.push(build_offer(&order, &request, &candidate));
    }
    Ok(offers)
}

/// Catch-up for a (re)connecting courier: replay each pending offer over the
/// freshly registered channel.
pub async fn replay_pending(state: Arc<AppState>, courier: Courier) {
    match pending_offers(&state, &courier).await {
        Ok(offers) => {
            if offers.is_empty() {
                return;
            }
            let total = offers.len();
            let mut delivered = 0;
            for offer in &offers {
                if state
                    .registry
                    .send(Role::Courier, courier.actor_id, offer)
                    .is_delivered()
                {
                    delivered += 1;
                }
            }
            info!(courier_id = %courier.id, total, delivered, "replayed pending offers");
        }
        Err(err) => {
            warn!(courier_id = %courier.id, error = %err, "failed to build catch-up offers");
        }
    }
}
