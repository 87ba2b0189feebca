// core/src/model/order.rs

use super::Money;
use crate::error::Error;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fulfillment lifecycle of an order.
///
/// `pending -> processing -> completed`, or `pending/processing -> cancelled`.
/// `completed` and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Completed,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Processing,
    OrderStatus::Completed,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Processing => "processing",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
  }

  pub fn can_transition_to(&self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Cancelled)
    )
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(OrderStatus::Pending),
      "processing" => Ok(OrderStatus::Processing),
      "completed" => Ok(OrderStatus::Completed),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(Error::validation(format!("unknown order status '{}'", other))),
    }
  }
}

/// Payment outcome, independent of `OrderStatus`.
///
/// `pending -> paid | failed`, `failed -> pending | paid` (a new attempt).
/// `paid` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
}

impl PaymentStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentStatus::Pending => "pending",
      PaymentStatus::Paid => "paid",
      PaymentStatus::Failed => "failed",
    }
  }

  pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
      (self, next),
      (Pending, Paid) | (Pending, Failed) | (Failed, Pending) | (Failed, Paid)
    )
  }

  /// Audit note written with every payment row.
  pub fn history_note(&self) -> String {
    match self {
      PaymentStatus::Paid => "Payment received".to_string(),
      PaymentStatus::Failed => "Payment failed".to_string(),
      other => format!("Payment status updated to {}", other),
    }
  }
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(PaymentStatus::Pending),
      "paid" => Ok(PaymentStatus::Paid),
      "failed" => Ok(PaymentStatus::Failed),
      other => Err(Error::validation(format!("unknown payment status '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub customer_name: String,
  pub customer_email: String,
  pub customer_phone: Option<String>,
  pub customer_address: Option<String>,
  pub notes: Option<String>,

  pub subtotal: Money,
  pub discount_amount: Money,
  pub handling_fee: Money,
  pub total_amount: Money,

  pub status: OrderStatus,
  pub payment_status: PaymentStatus,
  pub payment_method: Option<String>,
  pub payment_token: Option<String>,
  pub payment_url: Option<String>,
  pub paid_at: Option<DateTime<Utc>>,
  /// Occurrence time of the last payment event that changed `payment_status`.
  pub payment_updated_at: Option<DateTime<Utc>>,

  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Option<Uuid>,
  pub item_name: String,
  pub item_description: Option<String>,
  pub quantity: i32,
  pub unit_price: Money,
  pub total_price: Money,
  pub brief_details: Option<String>,
  pub delivery_date: Option<NaiveDate>,
  pub revision_count: i32,
  pub max_revisions: i32,
  pub created_at: DateTime<Utc>,
}

/// An order together with its line items, as returned by `GET /orders/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}

/// One audit row. Rows are appended, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusHistory {
  pub id: Uuid,
  pub order_id: Uuid,
  /// Lifecycle status name, or `payment_updated` for payment rows.
  pub status: String,
  pub notes: Option<String>,
  pub changed_by: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Label used on history rows written by payment updates.
pub const PAYMENT_HISTORY_LABEL: &str = "payment_updated";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
  pub customer_name: String,
  pub customer_email: String,
  pub customer_phone: Option<String>,
  pub customer_address: Option<String>,
  pub notes: Option<String>,
  #[serde(default)]
  pub discount_amount: Option<Money>,
  #[serde(default)]
  pub handling_fee: Option<Money>,
  #[serde(default)]
  pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
  pub product_id: Option<Uuid>,
  #[serde(default)]
  pub item_name: String,
  pub item_description: Option<String>,
  pub quantity: i32,
  #[serde(default)]
  pub unit_price: Money,
  pub brief_details: Option<String>,
  /// `YYYY-MM-DD`.
  pub delivery_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
  pub status: String,
  pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifecycle_transitions() {
    use OrderStatus::*;
    assert!(Pending.can_transition_to(Processing));
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Processing.can_transition_to(Completed));
    assert!(!Pending.can_transition_to(Completed));
    assert!(!Completed.can_transition_to(Pending));
    assert!(!Cancelled.can_transition_to(Processing));
    assert!(!Pending.can_transition_to(Pending));
  }

  #[test]
  fn payment_paid_is_terminal() {
    use PaymentStatus::*;
    assert!(!Paid.can_transition_to(Failed));
    assert!(!Paid.can_transition_to(Pending));
    assert!(Failed.can_transition_to(Pending));
  }

  #[test]
  fn status_parsing_rejects_unknown_values() {
    assert_eq!("Completed".parse::<OrderStatus>().ok(), Some(OrderStatus::Completed));
    assert!(matches!("shipped".parse::<OrderStatus>(), Err(Error::Validation(_))));
    assert!(matches!("refunded".parse::<PaymentStatus>(), Err(Error::Validation(_))));
  }
}
