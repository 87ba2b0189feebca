// core/src/store/memory.rs

//! Process-local stores for tests and `STORAGE=memory` development runs.
//!
//! `MemoryOrderStore` holds one `tokio::sync::Mutex` for the whole lifetime of
//! a transaction, so transactions are serialized outright. Writes go to a
//! staged copy that replaces the shared state only on commit.

use super::{Catalog, CatalogProduct, CredentialStore, OrderStore, OrderTx, PaymentChange, UnresolvedWebhook};
use crate::error::{Error, Result};
use crate::model::{
  Order, OrderAnalytics, OrderItem, OrderStatus, OrderStatusHistory, OrderWithItems, Page, PaymentStatus, Principal, Role,
  TokenRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct CredentialState {
  principals: HashMap<Uuid, Principal>,
  tokens: HashMap<Uuid, TokenRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
  state: RwLock<CredentialState>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn token_count(&self) -> usize {
    self.state.read().tokens.len()
  }

  pub fn set_active(&self, principal_id: Uuid, active: bool) {
    if let Some(p) = self.state.write().principals.get_mut(&principal_id) {
      p.is_active = active;
    }
  }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
  async fn find_active_principal(&self, username: &str) -> Result<Option<Principal>> {
    let state = self.state.read();
    Ok(
      state
        .principals
        .values()
        .find(|p| p.username == username && p.is_active)
        .cloned(),
    )
  }

  async fn find_principal(&self, id: Uuid) -> Result<Option<Principal>> {
    Ok(self.state.read().principals.get(&id).cloned())
  }

  async fn insert_token(&self, record: &TokenRecord) -> Result<()> {
    let mut state = self.state.write();
    if state.tokens.contains_key(&record.id) {
      return Err(Error::Conflict(format!("token {} already exists", record.id)));
    }
    state.tokens.insert(record.id, record.clone());
    Ok(())
  }

  async fn find_token(&self, id: Uuid) -> Result<Option<TokenRecord>> {
    Ok(self.state.read().tokens.get(&id).cloned())
  }

  async fn revoke_token(&self, id: Uuid) -> Result<bool> {
    match self.state.write().tokens.get_mut(&id) {
      Some(record) => {
        record.revoked = true;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn revoke_all_for_principal(&self, principal_id: Uuid) -> Result<u64> {
    let mut state = self.state.write();
    let mut count = 0;
    for record in state.tokens.values_mut().filter(|r| r.principal_id == principal_id && !r.revoked) {
      record.revoked = true;
      count += 1;
    }
    Ok(count)
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let mut state = self.state.write();
    let before = state.tokens.len();
    state.tokens.retain(|_, r| !r.revoked && r.expires_at > now);
    Ok((before - state.tokens.len()) as u64)
  }

  async fn update_password_hash(&self, principal_id: Uuid, password_hash: &str) -> Result<()> {
    let mut state = self.state.write();
    let principal = state
      .principals
      .get_mut(&principal_id)
      .ok_or_else(|| Error::not_found(format!("principal {}", principal_id)))?;
    principal.password_hash = password_hash.to_string();
    Ok(())
  }

  async fn touch_last_login(&self, principal_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    if let Some(p) = self.state.write().principals.get_mut(&principal_id) {
      p.last_login_at = Some(at);
    }
    Ok(())
  }

  async fn seed_principal(&self, username: &str, password_hash: &str, role: Role) -> Result<Principal> {
    let mut state = self.state.write();
    if let Some(existing) = state.principals.values().find(|p| p.username == username) {
      return Ok(existing.clone());
    }
    let principal = Principal {
      id: Uuid::new_v4(),
      username: username.to_string(),
      password_hash: password_hash.to_string(),
      role,
      is_active: true,
      last_login_at: None,
      created_at: Utc::now(),
    };
    state.principals.insert(principal.id, principal.clone());
    Ok(principal)
  }
}

#[derive(Debug, Clone, Default)]
struct OrderState {
  orders: HashMap<Uuid, Order>,
  items: Vec<OrderItem>,
  history: Vec<OrderStatusHistory>,
  unresolved: Vec<UnresolvedWebhook>,
}

impl OrderState {
  fn sorted_orders<'a>(&'a self, filter: impl Fn(&Order) -> bool) -> Vec<&'a Order> {
    let mut orders: Vec<&Order> = self.orders.values().filter(|o| filter(o)).collect();
    orders.sort_by(|a, b| {
      b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.order_number.cmp(&a.order_number))
    });
    orders
  }

  fn order_mut(&mut self, id: Uuid) -> Result<&mut Order> {
    self.orders.get_mut(&id).ok_or_else(|| Error::not_found(format!("order {}", id)))
  }
}

fn paginate(orders: Vec<&Order>, page: Page) -> Vec<Order> {
  orders
    .into_iter()
    .skip(page.offset as usize)
    .take(page.limit as usize)
    .cloned()
    .collect()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
  state: Arc<Mutex<OrderState>>,
}

impl MemoryOrderStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn unresolved_webhooks(&self) -> Vec<UnresolvedWebhook> {
    self.state.lock().await.unresolved.clone()
  }

  pub async fn order_count(&self) -> usize {
    self.state.lock().await.orders.len()
  }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn begin(&self) -> Result<Box<dyn OrderTx>> {
    let guard = Arc::clone(&self.state).lock_owned().await;
    let staged = guard.clone();
    Ok(Box::new(MemoryOrderTx { guard, staged }))
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<OrderWithItems>> {
    let state = self.state.lock().await;
    Ok(state.orders.get(&id).map(|order| OrderWithItems {
      order: order.clone(),
      items: state.items.iter().filter(|i| i.order_id == id).cloned().collect(),
    }))
  }

  async fn list_orders(&self, page: Page) -> Result<Vec<Order>> {
    let state = self.state.lock().await;
    Ok(paginate(state.sorted_orders(|_| true), page))
  }

  async fn list_by_status(&self, status: OrderStatus, page: Page) -> Result<Vec<Order>> {
    let state = self.state.lock().await;
    Ok(paginate(state.sorted_orders(|o| o.status == status), page))
  }

  async fn history(&self, order_id: Uuid) -> Result<Vec<OrderStatusHistory>> {
    let state = self.state.lock().await;
    Ok(state.history.iter().filter(|h| h.order_id == order_id).cloned().collect())
  }

  async fn resolve_reference(&self, reference: &str) -> Result<Option<Uuid>> {
    let state = self.state.lock().await;
    if let Ok(id) = Uuid::parse_str(reference) {
      if state.orders.contains_key(&id) {
        return Ok(Some(id));
      }
    }
    Ok(state.orders.values().find(|o| o.order_number == reference).map(|o| o.id))
  }

  async fn record_unresolved_webhook(&self, entry: &UnresolvedWebhook) -> Result<()> {
    self.state.lock().await.unresolved.push(entry.clone());
    Ok(())
  }

  async fn order_analytics(&self, day_start: DateTime<Utc>) -> Result<OrderAnalytics> {
    let state = self.state.lock().await;
    let day_end = day_start + Duration::days(1);
    let mut analytics = OrderAnalytics::empty(Utc::now());
    for order in state.orders.values() {
      let today = order.created_at >= day_start && order.created_at < day_end;
      let completed = order.status == OrderStatus::Completed;
      analytics.total_orders += 1;
      *analytics.orders_by_status.entry(order.status.as_str().to_string()).or_insert(0) += 1;
      if completed {
        analytics.total_revenue += order.total_amount;
      }
      if today {
        analytics.today_orders += 1;
        if completed {
          analytics.today_revenue += order.total_amount;
        }
      }
    }
    Ok(analytics)
  }
}

pub struct MemoryOrderTx {
  guard: OwnedMutexGuard<OrderState>,
  staged: OrderState,
}

#[async_trait]
impl OrderTx for MemoryOrderTx {
  async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
    Ok(self.staged.orders.get(&id).cloned())
  }

  async fn insert_order(&mut self, order: &Order) -> Result<()> {
    if self.staged.orders.contains_key(&order.id)
      || self.staged.orders.values().any(|o| o.order_number == order.order_number)
    {
      return Err(Error::Conflict(format!("order number {} already exists", order.order_number)));
    }
    self.staged.orders.insert(order.id, order.clone());
    Ok(())
  }

  async fn insert_item(&mut self, item: &OrderItem) -> Result<()> {
    if !self.staged.orders.contains_key(&item.order_id) {
      return Err(Error::Integrity(format!("item references missing order {}", item.order_id)));
    }
    self.staged.items.push(item.clone());
    Ok(())
  }

  async fn set_status(&mut self, id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order> {
    let order = self.staged.order_mut(id)?;
    order.status = status;
    order.updated_at = at;
    match status {
      OrderStatus::Completed if order.completed_at.is_none() => order.completed_at = Some(at),
      OrderStatus::Cancelled if order.cancelled_at.is_none() => order.cancelled_at = Some(at),
      _ => {}
    }
    Ok(order.clone())
  }

  async fn set_payment(&mut self, id: Uuid, change: &PaymentChange) -> Result<Order> {
    let order = self.staged.order_mut(id)?;
    order.payment_status = change.status;
    if change.method.is_some() {
      order.payment_method = change.method.clone();
    }
    if change.status == PaymentStatus::Paid && order.paid_at.is_none() {
      order.paid_at = Some(change.occurred_at);
    }
    order.payment_updated_at = Some(change.occurred_at);
    order.updated_at = change.at;
    Ok(order.clone())
  }

  async fn append_history(&mut self, row: &OrderStatusHistory) -> Result<()> {
    if !self.staged.orders.contains_key(&row.order_id) {
      return Err(Error::Integrity(format!("history references missing order {}", row.order_id)));
    }
    self.staged.history.push(row.clone());
    Ok(())
  }

  async fn commit(self: Box<Self>) -> Result<()> {
    let MemoryOrderTx { mut guard, staged } = *self;
    *guard = staged;
    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
  products: RwLock<HashMap<Uuid, CatalogProduct>>,
}

impl MemoryCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, product: CatalogProduct) {
    self.products.write().insert(product.id, product);
  }
}

#[async_trait]
impl Catalog for MemoryCatalog {
  async fn lookup_product(&self, id: Uuid) -> Result<Option<CatalogProduct>> {
    Ok(self.products.read().get(&id).cloned())
  }
}
