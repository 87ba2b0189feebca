// core/src/store/mod.rs

//! Persistence ports consumed by the engine, and their adapters.
//!
//! Every order mutation goes through an [`OrderTx`]: a scoped transaction
//! that is committed explicitly and rolled back on every other exit path
//! (early return, `?`, panic, cancelled future) simply by being dropped.

pub mod catalog;
pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::model::{Order, OrderAnalytics, OrderItem, OrderStatus, OrderStatusHistory, OrderWithItems, Page, PaymentStatus, Principal, Role, TokenRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub use catalog::{Catalog, CatalogProduct};
pub use memory::{MemoryCatalog, MemoryCredentialStore, MemoryOrderStore};
pub use postgres::PgStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
  async fn find_active_principal(&self, username: &str) -> Result<Option<Principal>>;
  async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>>;
  async fn insert_token(&self, record: &TokenRecord) -> Result<()>;
  async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>>;
  /// Returns whether a record was found. Revoking twice is fine.
  async fn revoke_token(&self, id: Uuid) -> Result<bool>;
  async fn revoke_all_for_principal(&self, principal_id: Uuid) -> Result<u64>;
  /// Deletes records that are expired at `now` or revoked.
  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
  async fn update_password_hash(&self, principal_id: Uuid, password_hash: &str) -> Result<()>;
  async fn touch_last_login(&self, principal_id: Uuid, at: DateTime<Utc>) -> Result<()>;
  /// Inserts the principal unless the username is taken; returns the stored row.
  async fn seed_principal(&self, username: &str, password_hash: &str, role: Role) -> Result<Principal>;
}

/// Payment fields written by `OrderTx::set_payment`.
#[derive(Debug, Clone)]
pub struct PaymentChange {
  pub status: PaymentStatus,
  pub method: Option<String>,
  /// When the provider says the payment event happened.
  pub occurred_at: DateTime<Utc>,
  pub at: DateTime<Utc>,
}

/// A webhook that parsed but could not be matched to an order, kept for
/// manual reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct UnresolvedWebhook {
  pub id: Uuid,
  pub event_type: String,
  pub reference: Option<String>,
  pub reason: String,
  pub payload: serde_json::Value,
  pub received_at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  async fn begin(&self) -> Result<Box<dyn OrderTx>>;
  async fn get_order(&self, id: Uuid) -> Result<Option<OrderWithItems>>;
  /// Newest first.
  async fn list_orders(&self, page: Page) -> Result<Vec<Order>>;
  async fn list_by_status(&self, status: OrderStatus, page: Page) -> Result<Vec<Order>>;
  /// Oldest first, in commit order.
  async fn history(&self, order_id: Uuid) -> Result<Vec<OrderStatusHistory>>;
  /// Matches a UUID order id or an order number.
  async fn resolve_reference(&self, reference: &str) -> Result<Option<Uuid>>;
  async fn record_unresolved_webhook(&self, entry: &UnresolvedWebhook) -> Result<()>;
  /// Dashboard figures; "today" covers `[day_start, day_start + 1 day)`.
  async fn order_analytics(&self, day_start: DateTime<Utc>) -> Result<OrderAnalytics>;
}

/// One open order transaction.
#[async_trait]
pub trait OrderTx: Send {
  /// Reads the order and holds a write lock on it until the transaction ends.
  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;
  async fn insert_order(&mut self, order: &Order) -> Result<()>;
  async fn insert_item(&mut self, item: &OrderItem) -> Result<()>;
  /// Sets `status`, bumps `updated_at`, and stamps `completed_at` /
  /// `cancelled_at` when entering those states. Returns the updated row.
  async fn set_status(&mut self, id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order>;
  /// Writes the payment fields. `paid_at` is stamped when entering `paid`.
  async fn set_payment(&mut self, id: Uuid, change: &PaymentChange) -> Result<Order>;
  async fn append_history(&mut self, row: &OrderStatusHistory) -> Result<()>;
  async fn commit(self: Box<Self>) -> Result<()>;
}

/// Builds a history row stamped with a fresh id.
pub fn history_row(order_id: Uuid, status: &str, notes: Option<String>, changed_by: Option<String>, at: DateTime<Utc>) -> OrderStatusHistory {
  OrderStatusHistory {
    id: Uuid::new_v4(),
    order_id,
    status: status.to_string(),
    notes,
    changed_by,
    created_at: at,
  }
}
