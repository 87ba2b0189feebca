// server/tests/api_tests.rs

use actix_web::{test, web, App};
use orderdesk::model::Role;
use orderdesk::webhook::sign_payload;
use orderdesk_server::config::AppConfig;
use orderdesk_server::state::{AppState, Stores};
use orderdesk_server::web::configure_app_routes;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

const WEBHOOK_SECRET: &str = "server-test-webhook-secret";
const ADMIN: (&str, &str) = ("root", "root-password-1");
const VIEWER: (&str, &str) = ("viewer", "viewer-password-1");

fn test_config() -> AppConfig {
  let vars: HashMap<&str, &str> = HashMap::from([
    ("STORAGE", "memory"),
    ("JWT_SECRET", "server-test-jwt-secret"),
    ("WEBHOOK_SECRET", WEBHOOK_SECRET),
    ("SEED_DB", "true"),
    ("SEED_ADMIN_USERNAME", ADMIN.0),
    ("SEED_ADMIN_PASSWORD", ADMIN.1),
  ]);
  AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).expect("test config")
}

async fn test_state() -> AppState {
  let (hub, _task) = orderdesk::NotificationHub::spawn(64);
  let state = AppState::new(Arc::new(test_config()), Stores::memory(), hub);
  state.seed().await.expect("seed admin");
  state
    .tokens
    .seed_principal(VIEWER.0, VIEWER.1, Role::Viewer)
    .await
    .expect("seed viewer");
  state
}

macro_rules! app {
  ($state:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($state.clone()))
        .configure(configure_app_routes),
    )
    .await
  };
}

macro_rules! login {
  ($app:expr, $who:expr) => {{
    let who: (&str, &str) = $who;
    let req = test::TestRequest::post()
      .uri("/api/v1/sessions")
      .set_json(json!({ "username": who.0, "password": who.1 }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&$app, req).await;
    assert_eq!(body["success"], true, "login failed: {}", body);
    body["data"]["token"].as_str().expect("token").to_string()
  }};
}

fn bearer(token: &str) -> (&'static str, String) {
  ("Authorization", format!("Bearer {}", token))
}

fn money(v: &Value) -> Decimal {
  v.as_str().expect("decimal string").parse().expect("decimal")
}

fn order_body() -> Value {
  json!({
    "customerName": "Dewi Lestari",
    "customerEmail": "dewi@example.com",
    "items": [
      { "itemName": "Logo design", "quantity": 2, "unitPrice": "100.00" },
      { "itemName": "Rush fee", "quantity": 1, "unitPrice": "50.00" }
    ]
  })
}

#[actix_web::test]
async fn health_is_public() {
  let state = test_state().await;
  let app = app!(state);
  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/health").to_request()).await;
  assert!(resp.status().is_success());
}

#[actix_web::test]
async fn login_failures_are_uniform() {
  let state = test_state().await;
  let app = app!(state);

  for (user, pass) in [(ADMIN.0, "wrong-password"), ("ghost", ADMIN.1)] {
    let req = test::TestRequest::post()
      .uri("/api/v1/sessions")
      .set_json(json!({ "username": user, "password": pass }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "authentication");
    assert_eq!(body["error"]["message"], "Invalid credentials");
  }
}

#[actix_web::test]
async fn protected_routes_need_a_valid_token() {
  let state = test_state().await;
  let app = app!(state);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/orders").to_request()).await;
  assert_eq!(resp.status(), 401);

  let req = test::TestRequest::get()
    .uri("/api/v1/orders")
    .insert_header(bearer("not-a-token"))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn order_lifecycle_over_http() {
  let state = test_state().await;
  let app = app!(state);
  let token = login!(app, ADMIN);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(order_body())
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 201);
  let created: Value = test::read_body_json(resp).await;
  let order = &created["data"];
  assert_eq!(money(&order["totalAmount"]), dec!(250));
  assert_eq!(order["status"], "pending");
  assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
  let id = order["id"].as_str().unwrap().to_string();

  for (status, expected) in [("processing", 200), ("completed", 200), ("pending", 409)] {
    let req = test::TestRequest::put()
      .uri(&format!("/api/v1/orders/{}/status", id))
      .insert_header(bearer(&token))
      .set_json(json!({ "status": status }))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), expected, "moving to {}", status);
  }

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}/history", id))
    .insert_header(bearer(&token))
    .to_request();
  let history: Value = test::call_and_read_body_json(&app, req).await;
  let labels: Vec<&str> = history["data"]
    .as_array()
    .unwrap()
    .iter()
    .filter_map(|row| row["status"].as_str())
    .collect();
  assert_eq!(labels, vec!["pending", "processing", "completed"]);

  let req = test::TestRequest::get()
    .uri("/api/v1/orders/status/completed?limit=5")
    .insert_header(bearer(&token))
    .to_request();
  let listed: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(listed["data"][0]["id"], id.as_str());
  assert!(listed["data"][0]["completedAt"].is_string());

  let req = test::TestRequest::get()
    .uri("/api/v1/orders/analytics")
    .insert_header(bearer(&token))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 200);
  let analytics: Value = test::read_body_json(resp).await;
  let data = &analytics["data"];
  assert_eq!(data["totalOrders"], 1);
  assert_eq!(money(&data["totalRevenue"]), dec!(250));
  assert_eq!(data["ordersByStatus"]["completed"], 1);
  assert_eq!(data["ordersByStatus"]["pending"], 0);
  assert_eq!(data["todayOrders"], 1);
  assert_eq!(money(&data["todayRevenue"]), dec!(250));
}

#[actix_web::test]
async fn amounts_outside_the_money_columns_are_rejected() {
  let state = test_state().await;
  let app = app!(state);
  let token = login!(app, ADMIN);

  for (price, discount) in [("0.005", "0"), ("10.00", "0.004"), ("1000000000000", "0")] {
    let req = test::TestRequest::post()
      .uri("/api/v1/orders")
      .insert_header(bearer(&token))
      .set_json(json!({
        "customerName": "Dewi Lestari",
        "customerEmail": "dewi@example.com",
        "discountAmount": discount,
        "items": [{ "itemName": "Logo design", "quantity": 1, "unitPrice": price }]
      }))
      .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400, "price {} discount {}", price, discount);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["kind"], "validation");
  }
  assert!(state.engine.list_orders(Default::default()).await.unwrap().is_empty());
}

#[actix_web::test]
async fn bad_input_maps_to_client_errors() {
  let state = test_state().await;
  let app = app!(state);
  let token = login!(app, ADMIN);

  let cases = vec![
    (test::TestRequest::get().uri("/api/v1/orders/not-a-uuid"), 400),
    (
      test::TestRequest::get().uri(&format!("/api/v1/orders/{}", uuid::Uuid::new_v4())),
      404,
    ),
    (test::TestRequest::get().uri("/api/v1/orders/status/shipped"), 400),
    (
      test::TestRequest::post()
        .uri("/api/v1/orders")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"customerName\":"),
      400,
    ),
    (
      test::TestRequest::post()
        .uri("/api/v1/orders")
        .set_json(json!({ "customerName": "A", "customerEmail": "a@b.c", "items": [] })),
      400,
    ),
  ];

  for (req, expected) in cases {
    let resp = test::call_service(&app, req.insert_header(bearer(&token)).to_request()).await;
    assert_eq!(resp.status(), expected);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]["kind"].is_string());
  }
}

#[actix_web::test]
async fn viewers_cannot_mutate_orders() {
  let state = test_state().await;
  let app = app!(state);
  let viewer = login!(app, VIEWER);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&viewer))
    .set_json(order_body())
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 403);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["error"]["kind"], "authorization");

  let req = test::TestRequest::get()
    .uri("/api/v1/orders")
    .insert_header(bearer(&viewer))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), 200);
}

#[actix_web::test]
async fn logout_and_password_change_revoke_tokens() {
  let state = test_state().await;
  let app = app!(state);

  let first = login!(app, ADMIN);
  let req = test::TestRequest::delete()
    .uri("/api/v1/sessions")
    .insert_header(bearer(&first))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), 200);
  let req = test::TestRequest::get()
    .uri("/api/v1/orders")
    .insert_header(bearer(&first))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), 401);

  let second = login!(app, ADMIN);
  let third = login!(app, ADMIN);
  let req = test::TestRequest::put()
    .uri("/api/v1/sessions/password")
    .insert_header(bearer(&second))
    .set_json(json!({ "currentPassword": ADMIN.1, "newPassword": "a-new-root-password" }))
    .to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(body["data"]["revokedTokens"], 2);

  for token in [&second, &third] {
    let req = test::TestRequest::get()
      .uri("/api/v1/orders")
      .insert_header(bearer(token))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
  }
  login!(app, (ADMIN.0, "a-new-root-password"));
}

#[actix_web::test]
async fn payment_webhook_signature_and_acknowledgement() {
  let state = test_state().await;
  let app = app!(state);
  let token = login!(app, ADMIN);

  let req = test::TestRequest::post()
    .uri("/api/v1/orders")
    .insert_header(bearer(&token))
    .set_json(order_body())
    .to_request();
  let created: Value = test::call_and_read_body_json(&app, req).await;
  let id = created["data"]["id"].as_str().unwrap().to_string();

  let body = serde_json::to_vec(&json!({
    "event": "payment.completed",
    "data": { "id": "pay_1", "status": "completed", "metadata": { "order_id": id }, "paidAt": "2025-06-01T10:00:00Z" }
  }))
  .unwrap();

  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/payments")
    .insert_header(("X-Webhook-Signature", "00ff"))
    .set_payload(body.clone())
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), 401);
  let rejected: Value = test::read_body_json(resp).await;
  assert_eq!(rejected["error"]["kind"], "invalid_signature");

  let signature = sign_payload(WEBHOOK_SECRET.as_bytes(), &body);
  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/payments")
    .insert_header(("X-Webhook-Signature", signature))
    .set_payload(body)
    .to_request();
  let ack: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(ack["success"], true);
  assert_eq!(ack["data"]["result"], "applied");
  assert_eq!(ack["data"]["payment"], "applied");

  let unknown = serde_json::to_vec(&json!({
    "event": "payment.completed",
    "data": { "description": "Payment for Order #ORD-00000000000000-0000" }
  }))
  .unwrap();
  let signature = sign_payload(WEBHOOK_SECRET.as_bytes(), &unknown);
  let req = test::TestRequest::post()
    .uri("/api/v1/webhooks/payments")
    .insert_header(("X-Webhook-Signature", signature))
    .set_payload(unknown)
    .to_request();
  let ack: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(ack["success"], true);
  assert_eq!(ack["data"]["result"], "unresolved");

  let req = test::TestRequest::get()
    .uri(&format!("/api/v1/orders/{}", id))
    .insert_header(bearer(&token))
    .to_request();
  let order: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(order["data"]["paymentStatus"], "paid");
}

#[actix_web::test]
async fn live_upgrade_requires_a_token() {
  let state = test_state().await;
  let app = app!(state);
  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/live").to_request()).await;
  assert_eq!(resp.status(), 401);

  let req = test::TestRequest::get().uri("/api/v1/live?token=garbage").to_request();
  assert_eq!(test::call_service(&app, req).await.status(), 401);
}
