// core/src/model/live.rs

use super::{Money, Order, OrderAnalytics, OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
  OrderCreated,
  OrderUpdate,
  DashboardUpdate,
}

/// Order summary pushed to dashboards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
  pub id: Uuid,
  pub order_number: String,
  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub total_amount: Money,
  pub customer: String,
  pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderUpdate {
  fn from(order: &Order) -> Self {
    OrderUpdate {
      id: order.id,
      order_number: order.order_number.clone(),
      status: order.status,
      payment_status: order.payment_status,
      total_amount: order.total_amount,
      customer: order.customer_name.clone(),
      updated_at: order.updated_at,
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LivePayload {
  Order(OrderUpdate),
  Dashboard(OrderAnalytics),
}

/// Envelope written to every live connection.
#[derive(Debug, Clone, Serialize)]
pub struct LiveMessage {
  #[serde(rename = "type")]
  pub kind: LiveEventKind,
  pub data: LivePayload,
  pub timestamp: DateTime<Utc>,
}

impl LiveMessage {
  pub fn new(kind: LiveEventKind, order: &Order) -> Self {
    LiveMessage {
      kind,
      data: LivePayload::Order(OrderUpdate::from(order)),
      timestamp: Utc::now(),
    }
  }

  pub fn dashboard(analytics: OrderAnalytics) -> Self {
    LiveMessage {
      kind: LiveEventKind::DashboardUpdate,
      data: LivePayload::Dashboard(analytics),
      timestamp: Utc::now(),
    }
  }
}
