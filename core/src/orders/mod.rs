// core/src/orders/mod.rs

//! Order Lifecycle Engine.
//!
//! All mutations run inside one `OrderTx` that locks the order row first, so
//! two concurrent transitions of the same order are serialized and the second
//! one sees the first one's result. Broadcasts happen strictly after commit
//! and never affect the outcome of the call.

pub mod create;
pub mod lifecycle;
pub mod number;

use crate::core::{ContextData, PipelineResult};
use crate::error::{Error, PipelineError, Result};
use crate::hub::HubHandle;
use crate::model::{
  LiveEventKind, LiveMessage, NewOrder, Order, OrderAnalytics, OrderStatus, OrderStatusHistory, OrderWithItems, Page,
  PAYMENT_HISTORY_LABEL,
};
use crate::pipeline::Pipeline;
use crate::store::{history_row, Catalog, OrderStore, PaymentChange};
use chrono::{NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub use create::CreateOrderCtx;
pub use lifecycle::{reconcile, PaymentOutcome, PaymentUpdate};
pub use number::OrderNumberAllocator;

pub struct OrderEngine {
  store: Arc<dyn OrderStore>,
  hub: HubHandle,
  create_pipeline: Pipeline<CreateOrderCtx, Error>,
}

impl OrderEngine {
  pub fn new(store: Arc<dyn OrderStore>, catalog: Arc<dyn Catalog>, hub: HubHandle) -> Self {
    let numbers = Arc::new(OrderNumberAllocator::new());
    let create_pipeline = create::build_pipeline(store.clone(), catalog, hub.clone(), numbers);
    OrderEngine {
      store,
      hub,
      create_pipeline,
    }
  }

  pub fn store(&self) -> &Arc<dyn OrderStore> {
    &self.store
  }

  /// Validates, prices and stores a new order with its items and first history
  /// row, all or nothing, then announces it.
  #[instrument(name = "orders::create", skip(self, request), fields(items = request.items.len()), err(Display))]
  pub async fn create_order(&self, request: NewOrder, actor: Option<String>) -> Result<OrderWithItems> {
    let ctx = ContextData::new(CreateOrderCtx::new(request, actor));
    match self.create_pipeline.run(ctx.clone()).await? {
      PipelineResult::Completed => {}
      PipelineResult::Stopped => {
        return Err(PipelineError::Internal("order creation stopped before completion".to_string()).into());
      }
    }
    let finished = ctx
      .try_unwrap()
      .map_err(|_| PipelineError::Internal("order context still shared after the run".to_string()))?;
    let order = finished
      .order
      .ok_or_else(|| PipelineError::Internal("order creation produced no order".to_string()))?;
    Ok(OrderWithItems {
      order,
      items: finished.items,
    })
  }

  /// Moves an order along its lifecycle and records the transition.
  ///
  /// Illegal transitions fail with `Conflict` and leave the order untouched.
  #[instrument(name = "orders::update_status", skip_all, fields(%order_id, to = %new_status), err(Display))]
  pub async fn update_status(
    &self,
    order_id: Uuid,
    new_status: OrderStatus,
    notes: Option<String>,
    actor: Option<String>,
  ) -> Result<Order> {
    let mut tx = self.store.begin().await?;
    let current = tx
      .lock_order(order_id)
      .await?
      .ok_or_else(|| Error::not_found(format!("order {}", order_id)))?;

    if !current.status.can_transition_to(new_status) {
      return Err(Error::Conflict(format!(
        "invalid transition from {} to {}",
        current.status, new_status
      )));
    }

    let now = Utc::now();
    let updated = tx.set_status(order_id, new_status, now).await?;
    tx.append_history(&history_row(order_id, new_status.as_str(), notes, actor, now))
      .await?;
    tx.commit().await?;

    info!(from = %current.status, "order status updated");
    self.announce(&updated);
    Ok(updated)
  }

  /// Reconciles a payment event against the order's payment state.
  ///
  /// Every call appends a `payment_updated` history row, including stale and
  /// duplicate deliveries; see [`reconcile`] for how the outcome is chosen.
  #[instrument(
    name = "orders::update_payment_status",
    skip_all,
    fields(%order_id, status = %update.status, occurred_at = %update.occurred_at),
    err(Display)
  )]
  pub async fn update_payment_status(&self, order_id: Uuid, update: PaymentUpdate) -> Result<PaymentOutcome> {
    let mut tx = self.store.begin().await?;
    let current = tx
      .lock_order(order_id)
      .await?
      .ok_or_else(|| Error::not_found(format!("order {}", order_id)))?;

    let outcome = reconcile(
      current.payment_status,
      current.payment_updated_at,
      update.status,
      update.occurred_at,
    );
    let now = Utc::now();

    let updated = match outcome {
      PaymentOutcome::Applied => {
        let change = PaymentChange {
          status: update.status,
          method: update.method.clone(),
          occurred_at: update.occurred_at,
          at: now,
        };
        Some(tx.set_payment(order_id, &change).await?)
      }
      PaymentOutcome::Unchanged | PaymentOutcome::Stale => None,
    };

    let note = lifecycle::payment_note(outcome, current.payment_status, update.status);
    tx.append_history(&history_row(order_id, PAYMENT_HISTORY_LABEL, Some(note), update.source.clone(), now))
      .await?;
    tx.commit().await?;

    match &updated {
      Some(order) => {
        info!(from = %current.payment_status, "payment status updated");
        self.announce(order);
      }
      None => debug!(?outcome, current = %current.payment_status, "payment event recorded without change"),
    }
    Ok(outcome)
  }

  pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems> {
    self
      .store
      .get_order(order_id)
      .await?
      .ok_or_else(|| Error::not_found(format!("order {}", order_id)))
  }

  pub async fn list_orders(&self, page: Page) -> Result<Vec<Order>> {
    self.store.list_orders(page).await
  }

  pub async fn list_by_status(&self, status: OrderStatus, page: Page) -> Result<Vec<Order>> {
    self.store.list_by_status(status, page).await
  }

  pub async fn order_history(&self, order_id: Uuid) -> Result<Vec<OrderStatusHistory>> {
    let rows = self.store.history(order_id).await?;
    if rows.is_empty() && self.store.get_order(order_id).await?.is_none() {
      return Err(Error::not_found(format!("order {}", order_id)));
    }
    Ok(rows)
  }

  /// Resolves an external reference (order id or order number).
  pub async fn resolve_reference(&self, reference: &str) -> Result<Option<Uuid>> {
    self.store.resolve_reference(reference.trim()).await
  }

  /// Totals over every order; "today" is the current UTC day.
  pub async fn analytics(&self) -> Result<OrderAnalytics> {
    let day_start = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    self.store.order_analytics(day_start).await
  }

  /// Broadcasts the current analytics as a `dashboard_update`. Returns whether
  /// the hub accepted it.
  pub async fn publish_dashboard(&self) -> Result<bool> {
    let analytics = self.analytics().await?;
    Ok(self.hub.broadcast(&LiveMessage::dashboard(analytics)))
  }

  /// Runs `publish_dashboard` every `every` until the returned handle is aborted.
  pub fn spawn_dashboard_task(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        if let Err(e) = self.publish_dashboard().await {
          warn!(error = %e, "dashboard update failed, retrying next tick");
        }
      }
    })
  }

  fn announce(&self, order: &Order) {
    if !self.hub.broadcast(&LiveMessage::new(LiveEventKind::OrderUpdate, order)) {
      debug!(order_id = %order.id, "order update not broadcast");
    }
  }
}
