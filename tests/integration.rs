use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use delivery_dispatch::api::router;
use delivery_dispatch::config::DispatchConfig;
use delivery_dispatch::models::courier::GeoPoint;
use delivery_dispatch::registry::Role;
use delivery_dispatch::state::AppState;

fn test_state() -> Arc<AppState> {
    // Offers must stay live across the whole scripted flow; expiry behavior
    // itself is covered by the engine unit tests.
    Arc::new(AppState::new(DispatchConfig {
        offer_timeout: Duration::from_secs(5),
        watcher_grace: Duration::from_secs(1),
        fallback_location: GeoPoint {
            lat: 16.87,
            lng: 96.20,
        },
    }))
}

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = test_state();
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn order_body() -> Value {
    json!({
        "restaurant_name": "Golden Bowl",
        "restaurant_location": { "lat": 16.80, "lng": 96.15 },
        "customer_name": "Aye Chan",
        "customer_location": { "lat": 16.90, "lng": 96.25 },
        "delivery_address": "12 Anawrahta Rd, Yangon",
        "items": [
            { "name": "Mohinga", "quantity": 2 },
            { "name": "Tea Leaf Salad", "quantity": 1 }
        ],
        "total_cents": 12500,
        "delivery_fee_cents": 1500,
        "payment_method": "cash"
    })
}

fn courier_body(name: &str, actor_id: Uuid, lat: f64, lng: f64) -> Value {
    json!({
        "name": name,
        "actor_id": actor_id,
        "location": { "lat": lat, "lng": lng }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["couriers_online"], 0);
    assert_eq!(body["customers_online"], 0);
    assert_eq!(body["restaurants_online"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));
}

#[tokio::test]
async fn create_courier_returns_courier() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", Uuid::new_v4(), 16.81, 96.16),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Min Thu");
    assert_eq!(body["status"], "Available");
    assert!(!body["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_courier_empty_name_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/couriers",
            json!({ "name": "  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn courier_cannot_set_itself_busy() {
    let (app, _state) = setup();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", Uuid::new_v4(), 16.81, 96.16),
        ))
        .await
        .unwrap();
    let courier = body_json(res).await;
    let id = courier["id"].as_str().unwrap();

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/couriers/{id}/status"),
            json!({ "status": "Busy" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_courier_location() {
    let (app, _state) = setup();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", Uuid::new_v4(), 16.81, 96.16),
        ))
        .await
        .unwrap();
    let courier = body_json(res).await;
    let id = courier["id"].as_str().unwrap();

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/couriers/{id}/location"),
            json!({ "location": { "lat": 16.85, "lng": 96.19 } }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["location"]["lat"], 16.85);
    assert_eq!(body["location"]["lng"], 96.19);
}

#[tokio::test]
async fn create_order_seeds_pending_order_and_cash_payment() {
    let (app, _state) = setup();
    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let order = body_json(res).await;
    assert_eq!(order["status"], "pending");
    let id = order["id"].as_str().unwrap();

    let res = app
        .oneshot(get_request(&format!("/orders/{id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let tracked = body_json(res).await;
    assert_eq!(tracked["order"]["id"].as_str().unwrap(), id);
    assert!(tracked["delivery"].is_null());
    assert_eq!(tracked["payment"]["method"], "cash");
    assert_eq!(tracked["payment"]["status"], "pending");
}

#[tokio::test]
async fn create_order_without_items_returns_400() {
    let (app, _state) = setup();
    let mut body = order_body();
    body["items"] = json!([]);

    let res = app
        .oneshot(json_request("POST", "/orders", body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/orders/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ready_without_couriers_leaves_order_ready() {
    let (app, _state) = setup();
    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request("POST", &format!("/orders/{id}/ready"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ready = body_json(res).await;
    assert_eq!(ready["status"], "ready");

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Dispatch halted without assignment; the order is untouched.
    let res = app
        .oneshot(get_request(&format!("/orders/{id}")))
        .await
        .unwrap();
    let tracked = body_json(res).await;
    assert_eq!(tracked["order"]["status"], "ready");
    assert!(tracked["delivery"].is_null());
}

#[tokio::test]
async fn ready_twice_returns_409() {
    let (app, _state) = setup();
    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request("POST", &format!("/orders/{id}/ready"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(json_request("POST", &format!("/orders/{id}/ready"), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn full_dispatch_flow_accept_pickup_deliver() {
    let (app, state) = setup();

    // Courier with a fake live channel standing in for the WebSocket.
    let actor_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.connect(Role::Courier, actor_id, tx);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", actor_id, 16.81, 96.16),
        ))
        .await
        .unwrap();
    let courier = body_json(res).await;
    let courier_id = courier["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/ready"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;

    // The offer arrived over the live channel.
    let raw = rx.try_recv().unwrap();
    let offer: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(offer["type"], "NEW_ORDER_REQUEST");
    assert_eq!(offer["order_id"].as_str().unwrap(), order_id);
    assert_eq!(offer["restaurant_name"], "Golden Bowl");
    assert_eq!(offer["items"].as_array().unwrap().len(), 2);
    assert!(offer["distance_km"].as_f64().unwrap() < 5.0);
    let request_id = offer["request_id"].as_str().unwrap().to_string();

    // Accept.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/respond"),
            json!({ "courier_id": courier_id, "action": "accept" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let accepted = body_json(res).await;
    assert_eq!(accepted["result"], "accepted");
    let delivery_id = accepted["delivery"]["id"].as_str().unwrap().to_string();
    assert_eq!(accepted["delivery"]["status"], "assigned");

    // A second accept on the same request is stale.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/respond"),
            json!({ "courier_id": courier_id, "action": "accept" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Pickup, then deliver.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/pickup"),
            json!({ "courier_id": courier_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let picked = body_json(res).await;
    assert_eq!(picked["status"], "picked_up");
    assert!(!picked["picked_up_at"].is_null());

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/deliveries/{delivery_id}/deliver"),
            json!({ "courier_id": courier_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let delivered = body_json(res).await;
    assert_eq!(delivered["status"], "delivered");
    assert!(!delivered["delivered_at"].is_null());

    // Cash settled, order closed out.
    let res = app
        .clone()
        .oneshot(get_request(&format!("/orders/{order_id}")))
        .await
        .unwrap();
    let tracked = body_json(res).await;
    assert_eq!(tracked["order"]["status"], "delivered");
    assert_eq!(tracked["payment"]["status"], "paid");

    // The dispatch counters saw the flow.
    let res = app.oneshot(get_request("/metrics")).await.unwrap();
    let body = body_string(res).await;
    assert!(body.contains("requests_resolved_total"));
    assert!(body.contains("offers_total"));
}

#[tokio::test]
async fn offline_courier_catches_up_via_poll() {
    let (app, _state) = setup();

    // Courier exists but has no live channel: the push is missed.
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", Uuid::new_v4(), 16.81, 96.16),
        ))
        .await
        .unwrap();
    let courier = body_json(res).await;
    let courier_id = courier["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/ready"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = app
        .clone()
        .oneshot(get_request(&format!("/couriers/{courier_id}/requests")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let offers = body_json(res).await;
    let offers = offers.as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["type"], "NEW_ORDER_REQUEST");
    assert_eq!(offers[0]["order_id"].as_str().unwrap(), order_id);

    // The polled offer is actionable: accept through the same contract.
    let request_id = offers[0]["request_id"].as_str().unwrap();
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/respond"),
            json!({ "courier_id": courier_id, "action": "accept" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn respond_with_wrong_courier_returns_409() {
    let (app, state) = setup();

    let actor_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.registry.connect(Role::Courier, actor_id, tx);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Min Thu", actor_id, 16.81, 96.16),
        ))
        .await
        .unwrap();
    body_json(res).await;

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/ready"),
            json!({}),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let offer: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
    let request_id = offer["request_id"].as_str().unwrap();

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/respond"),
            json!({ "courier_id": Uuid::new_v4(), "action": "accept" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn rejected_offer_moves_to_next_courier() {
    let (app, state) = setup();

    let near_actor = Uuid::new_v4();
    let far_actor = Uuid::new_v4();
    let (near_tx, mut near_rx) = mpsc::unbounded_channel();
    let (far_tx, mut far_rx) = mpsc::unbounded_channel();
    state.registry.connect(Role::Courier, near_actor, near_tx);
    state.registry.connect(Role::Courier, far_actor, far_tx);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Near", near_actor, 16.81, 96.16),
        ))
        .await
        .unwrap();
    let near = body_json(res).await;
    let near_id = near["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/couriers",
            courier_body("Far", far_actor, 16.95, 96.30),
        ))
        .await
        .unwrap();
    body_json(res).await;

    let res = app
        .clone()
        .oneshot(json_request("POST", "/orders", order_body()))
        .await
        .unwrap();
    let order = body_json(res).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/ready"),
            json!({}),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Closest courier is offered first and rejects.
    let offer: Value = serde_json::from_str(&near_rx.try_recv().unwrap()).unwrap();
    assert!(far_rx.try_recv().is_err());
    let request_id = offer["request_id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/respond"),
            json!({ "courier_id": near_id, "action": "reject" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rejected = body_json(res).await;
    assert_eq!(rejected["result"], "rejected");

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Re-dispatch skipped the rejecting courier and reached the other one.
    assert!(near_rx.try_recv().is_err());
    let next_offer: Value = serde_json::from_str(&far_rx.try_recv().unwrap()).unwrap();
    assert_eq!(next_offer["order_id"].as_str().unwrap(), order_id);
}
