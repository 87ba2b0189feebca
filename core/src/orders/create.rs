// core/src/orders/create.rs

//! Order creation, expressed as a pipeline:
//! `validate_request -> price_items -> allocate_order_number -> persist_order -> announce_order`.

use super::number::OrderNumberAllocator;
use crate::core::{ContextData, PipelineControl};
use crate::error::{Error, Result};
use crate::hub::HubHandle;
use crate::model::{
  money_fits, money_limit, LiveEventKind, LiveMessage, Money, NewOrder, Order, OrderItem, OrderStatus,
  PaymentStatus, MONEY_SCALE,
};
use crate::pipeline::Pipeline;
use crate::store::{history_row, Catalog, OrderStore};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const STEP_VALIDATE: &str = "validate_request";
pub const STEP_PRICE: &str = "price_items";
pub const STEP_NUMBER: &str = "allocate_order_number";
pub const STEP_PERSIST: &str = "persist_order";
pub const STEP_ANNOUNCE: &str = "announce_order";

const MAX_NUMBER_ATTEMPTS: usize = 3;
pub(crate) const DEFAULT_MAX_REVISIONS: i32 = 1;

/// State threaded through one order creation.
#[derive(Debug, Clone)]
pub struct CreateOrderCtx {
  pub request: NewOrder,
  pub actor: Option<String>,
  pub order_id: Uuid,
  pub now: DateTime<Utc>,

  pub delivery_dates: Vec<Option<NaiveDate>>,
  pub items: Vec<OrderItem>,
  pub subtotal: Money,
  pub total: Money,
  pub order_number: Option<String>,

  pub order: Option<Order>,
  pub announced: bool,
}

impl CreateOrderCtx {
  pub fn new(request: NewOrder, actor: Option<String>) -> Self {
    CreateOrderCtx {
      request,
      actor,
      order_id: Uuid::new_v4(),
      now: Utc::now(),
      delivery_dates: Vec::new(),
      items: Vec::new(),
      subtotal: Money::ZERO,
      total: Money::ZERO,
      order_number: None,
      order: None,
      announced: false,
    }
  }
}

fn validate(request: &NewOrder) -> Result<Vec<Option<NaiveDate>>> {
  if request.customer_name.trim().is_empty() {
    return Err(Error::validation("customerName is required"));
  }
  let email = request.customer_email.trim();
  if email.is_empty() || !email.contains('@') {
    return Err(Error::validation("customerEmail must be a valid email address"));
  }
  if request.items.is_empty() {
    return Err(Error::validation("an order needs at least one item"));
  }
  if request.discount_amount.is_some_and(|d| d < Money::ZERO) {
    return Err(Error::validation("discountAmount cannot be negative"));
  }
  if request.handling_fee.is_some_and(|f| f < Money::ZERO) {
    return Err(Error::validation("handlingFee cannot be negative"));
  }
  check_amount("discountAmount", request.discount_amount)?;
  check_amount("handlingFee", request.handling_fee)?;

  request
    .items
    .iter()
    .enumerate()
    .map(|(idx, item)| {
      if item.quantity < 1 {
        return Err(Error::validation(format!("items[{}].quantity must be at least 1", idx)));
      }
      if item.unit_price < Money::ZERO {
        return Err(Error::validation(format!("items[{}].unitPrice cannot be negative", idx)));
      }
      check_amount(&format!("items[{}].unitPrice", idx), Some(item.unit_price))?;
      if item.product_id.is_none() && item.item_name.trim().is_empty() {
        return Err(Error::validation(format!("items[{}].itemName is required", idx)));
      }
      item
        .delivery_date
        .as_deref()
        .map(|raw| {
          NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            Error::validation(format!("items[{}].deliveryDate must be YYYY-MM-DD", idx))
          })
        })
        .transpose()
    })
    .collect()
}

/// Rejects amounts the money columns would round or overflow.
fn check_amount(field: &str, amount: Option<Money>) -> Result<()> {
  match amount {
    Some(value) if !money_fits(value) => Err(Error::validation(format!(
      "{} must have at most {} decimal places and be below {}",
      field,
      MONEY_SCALE,
      money_limit()
    ))),
    _ => Ok(()),
  }
}

/// Line total, or a validation error when it leaves the storable range.
fn line_total(idx: usize, unit_price: Money, quantity: i32) -> Result<Money> {
  unit_price
    .checked_mul(Money::from(quantity))
    .filter(|total| money_fits(*total))
    .ok_or_else(|| Error::validation(format!("items[{}] amount out of range", idx)))
}

/// `subtotal - discount + fee`, rejected when negative or out of range.
fn order_total(subtotal: Money, discount: Money, fee: Money) -> Result<Money> {
  let total = subtotal
    .checked_sub(discount)
    .and_then(|t| t.checked_add(fee))
    .filter(|t| money_fits(*t))
    .ok_or_else(|| Error::validation("order amount out of range"))?;
  if total < Money::ZERO {
    return Err(Error::validation("discountAmount exceeds the order amount"));
  }
  Ok(total)
}

/// Builds the create-order pipeline. Each handler owns clones of the
/// collaborators it needs.
pub(crate) fn build_pipeline(
  store: Arc<dyn OrderStore>,
  catalog: Arc<dyn Catalog>,
  hub: HubHandle,
  numbers: Arc<OrderNumberAllocator>,
) -> Pipeline<CreateOrderCtx, Error> {
  let mut pipeline = Pipeline::new(&[
    (STEP_VALIDATE, false, None),
    (STEP_PRICE, false, None),
    (STEP_NUMBER, false, None),
    (STEP_PERSIST, false, None),
    (STEP_ANNOUNCE, true, None),
  ]);

  pipeline.on_root(STEP_VALIDATE, |ctx: ContextData<CreateOrderCtx>| async move {
    let dates = validate(&ctx.read().request)?;
    ctx.write().delivery_dates = dates;
    Ok::<_, Error>(PipelineControl::Continue)
  });

  pipeline.on_root(STEP_PRICE, move |ctx: ContextData<CreateOrderCtx>| {
    let catalog = catalog.clone();
    async move {
      let (request, dates, order_id, now) = ctx.with(|c| (c.request.clone(), c.delivery_dates.clone(), c.order_id, c.now));

      let mut items = Vec::with_capacity(request.items.len());
      let mut subtotal = Money::ZERO;
      for (idx, line) in request.items.iter().enumerate() {
        let mut item_name = line.item_name.trim().to_string();
        let mut unit_price = line.unit_price;

        if let Some(product_id) = line.product_id {
          let product = catalog
            .lookup_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| Error::validation(format!("items[{}].productId {} is not an active product", idx, product_id)))?;
          if unit_price != product.price {
            debug!(%product_id, requested = %unit_price, catalog = %product.price, "using catalog price");
          }
          unit_price = product.price;
          if item_name.is_empty() {
            item_name = product.name;
          }
        }

        let total_price = line_total(idx, unit_price, line.quantity)?;
        subtotal = subtotal
          .checked_add(total_price)
          .filter(|s| money_fits(*s))
          .ok_or_else(|| Error::validation(format!("items[{}] amount out of range", idx)))?;
        items.push(OrderItem {
          id: Uuid::new_v4(),
          order_id,
          product_id: line.product_id,
          item_name,
          item_description: line.item_description.clone(),
          quantity: line.quantity,
          unit_price,
          total_price,
          brief_details: line.brief_details.clone(),
          delivery_date: dates.get(idx).copied().flatten(),
          revision_count: 0,
          max_revisions: DEFAULT_MAX_REVISIONS,
          created_at: now,
        });
      }

      let discount = request.discount_amount.unwrap_or(Money::ZERO);
      let fee = request.handling_fee.unwrap_or(Money::ZERO);
      let total = order_total(subtotal, discount, fee)?;

      let mut guard = ctx.write();
      guard.items = items;
      guard.subtotal = subtotal;
      guard.total = total;
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  let numbers_for_alloc = numbers.clone();
  pipeline.on_root(STEP_NUMBER, move |ctx: ContextData<CreateOrderCtx>| {
    let numbers = numbers_for_alloc.clone();
    async move {
      let now = ctx.read().now;
      ctx.write().order_number = Some(numbers.next(now));
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  pipeline.on_root(STEP_PERSIST, move |ctx: ContextData<CreateOrderCtx>| {
    let store = store.clone();
    let numbers = numbers.clone();
    async move {
      let snapshot = ctx.read().clone();
      let mut order = draft_order(&snapshot)?;

      let mut attempt = 1;
      loop {
        match persist(store.as_ref(), &order, &snapshot.items, snapshot.actor.clone()).await {
          Ok(()) => break,
          Err(Error::Conflict(detail)) if attempt < MAX_NUMBER_ATTEMPTS => {
            warn!(order_number = %order.order_number, %detail, "order number taken, allocating another");
            order.order_number = numbers.next(Utc::now());
            attempt += 1;
          }
          Err(e) => return Err(e),
        }
      }

      info!(order_id = %order.id, order_number = %order.order_number, total = %order.total_amount, "order created");
      let mut guard = ctx.write();
      guard.order_number = Some(order.order_number.clone());
      guard.order = Some(order);
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  pipeline.on_root(STEP_ANNOUNCE, move |ctx: ContextData<CreateOrderCtx>| {
    let hub = hub.clone();
    async move {
      let message = ctx.read().order.as_ref().map(|o| LiveMessage::new(LiveEventKind::OrderCreated, o));
      if let Some(message) = message {
        let sent = hub.broadcast(&message);
        ctx.write().announced = sent;
      }
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  pipeline
}

fn draft_order(ctx: &CreateOrderCtx) -> Result<Order> {
  let order_number = ctx
    .order_number
    .clone()
    .ok_or_else(|| Error::Integrity("order number was not allocated".to_string()))?;
  let request = &ctx.request;
  Ok(Order {
    id: ctx.order_id,
    order_number,
    customer_name: request.customer_name.trim().to_string(),
    customer_email: request.customer_email.trim().to_string(),
    customer_phone: request.customer_phone.clone(),
    customer_address: request.customer_address.clone(),
    notes: request.notes.clone(),
    subtotal: ctx.subtotal,
    discount_amount: request.discount_amount.unwrap_or(Money::ZERO),
    handling_fee: request.handling_fee.unwrap_or(Money::ZERO),
    total_amount: ctx.total,
    status: OrderStatus::Pending,
    payment_status: PaymentStatus::Pending,
    payment_method: None,
    payment_token: None,
    payment_url: None,
    paid_at: None,
    payment_updated_at: None,
    created_at: ctx.now,
    updated_at: ctx.now,
    completed_at: None,
    cancelled_at: None,
  })
}

/// Writes the order, its items and the first history row in one transaction.
async fn persist(store: &dyn OrderStore, order: &Order, items: &[OrderItem], actor: Option<String>) -> Result<()> {
  let mut tx = store.begin().await?;
  tx.insert_order(order).await?;
  for item in items {
    tx.insert_item(item).await?;
  }
  tx.append_history(&history_row(
    order.id,
    OrderStatus::Pending.as_str(),
    Some("Order created".to_string()),
    actor,
    order.created_at,
  ))
  .await?;
  tx.commit().await
}
