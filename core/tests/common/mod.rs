// tests/common/mod.rs
#![allow(dead_code)] // Not every test binary uses every helper.

use chrono::Duration as ChronoDuration;
use orderdesk::auth::{TokenConfig, TokenService};
use orderdesk::hub::{HubHandle, NotificationHub, Subscription, DEFAULT_CLIENT_BUFFER};
use orderdesk::model::{Money, NewOrder, NewOrderItem, Role};
use orderdesk::orders::OrderEngine;
use orderdesk::store::{MemoryCatalog, MemoryCredentialStore, MemoryOrderStore};
use orderdesk::webhook::{sign_payload, WebhookGateway};
use orderdesk::{ContextData, PipelineControl, PipelineError};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

// --- Pipeline test context ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub message: String,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Pipeline error: {0}")]
  Pipeline(String),

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<PipelineError> for TestError {
  fn from(pe: PipelineError) -> Self {
    TestError::Pipeline(format!("{:?}", pe))
  }
}

pub fn create_simple_handler(
  step_name: &'static str,
  message_to_append: &'static str,
) -> orderdesk::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    let step_name_owned = step_name.to_string();
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.message.push_str(message_to_append);
      guard.steps_executed.push(step_name_owned.clone());
      if guard.should_stop_at.as_deref() == Some(step_name_owned.as_str()) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn create_failing_handler(
  step_name: &'static str,
  error_message: &'static str,
) -> orderdesk::Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    let step_name_owned = step_name.to_string();
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name_owned);
      Err(TestError::Handler(error_message.to_string()))
    })
  })
}

// --- Tracing ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Wired-up system over the in-memory stores ---
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const JWT_SECRET: &str = "jwt-test-secret-that-is-long-enough";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password-1";

pub struct TestSystem {
  pub orders: Arc<MemoryOrderStore>,
  pub catalog: Arc<MemoryCatalog>,
  pub credentials: Arc<MemoryCredentialStore>,
  pub hub: HubHandle,
  pub engine: Arc<OrderEngine>,
  pub gateway: WebhookGateway,
  pub tokens: Arc<TokenService>,
}

pub fn build_system() -> TestSystem {
  build_system_with(TokenConfig::new(JWT_SECRET))
}

pub fn build_system_with(token_config: TokenConfig) -> TestSystem {
  setup_tracing();
  let orders = Arc::new(MemoryOrderStore::new());
  let catalog = Arc::new(MemoryCatalog::new());
  let credentials = Arc::new(MemoryCredentialStore::new());
  let (hub, _task) = NotificationHub::spawn(DEFAULT_CLIENT_BUFFER);
  let engine = Arc::new(OrderEngine::new(orders.clone(), catalog.clone(), hub.clone()));
  let gateway = WebhookGateway::new(WEBHOOK_SECRET.as_bytes().to_vec(), engine.clone());
  let tokens = Arc::new(TokenService::new(credentials.clone(), token_config));
  TestSystem {
    orders,
    catalog,
    credentials,
    hub,
    engine,
    gateway,
    tokens,
  }
}

pub fn short_lived(ttl_secs: i64) -> TokenConfig {
  TokenConfig::new(JWT_SECRET).with_ttl(ChronoDuration::seconds(ttl_secs))
}

pub async fn seed_admin(system: &TestSystem) -> orderdesk::model::Principal {
  system
    .tokens
    .seed_principal(ADMIN_USERNAME, ADMIN_PASSWORD, Role::Admin)
    .await
    .expect("seed admin")
}

pub fn item(name: &str, unit_price: Money, quantity: i32) -> NewOrderItem {
  NewOrderItem {
    product_id: None,
    item_name: name.to_string(),
    item_description: None,
    quantity,
    unit_price,
    brief_details: None,
    delivery_date: None,
  }
}

pub fn new_order(items: Vec<NewOrderItem>) -> NewOrder {
  NewOrder {
    customer_name: "Dewi Lestari".to_string(),
    customer_email: "dewi@example.com".to_string(),
    customer_phone: Some("+62 812 0000 0000".to_string()),
    customer_address: None,
    notes: None,
    discount_amount: None,
    handling_fee: None,
    items,
  }
}

/// Body and signature exactly as the provider would send them.
pub fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
  let bytes = serde_json::to_vec(body).expect("serialize webhook body");
  let signature = sign_payload(WEBHOOK_SECRET.as_bytes(), &bytes);
  (bytes, signature)
}

/// Next live frame as JSON, or `None` if nothing arrives within `wait`.
pub async fn next_frame(sub: &mut Subscription, wait: Duration) -> Option<serde_json::Value> {
  let frame = tokio::time::timeout(wait, sub.recv()).await.ok()??;
  serde_json::from_str(&frame).ok()
}
