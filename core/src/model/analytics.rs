// core/src/model/analytics.rs
use super::{Money, OrderStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Dashboard figures over all orders. Revenue counts completed orders only;
/// "today" is the UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAnalytics {
  pub total_orders: i64,
  pub total_revenue: Money,
  /// Every status is present, zero when no order has it.
  pub orders_by_status: BTreeMap<String, i64>,
  pub today_orders: i64,
  pub today_revenue: Money,
  pub generated_at: DateTime<Utc>,
}

impl OrderAnalytics {
  pub fn empty(generated_at: DateTime<Utc>) -> Self {
    OrderAnalytics {
      total_orders: 0,
      total_revenue: Money::ZERO,
      orders_by_status: OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect(),
      today_orders: 0,
      today_revenue: Money::ZERO,
      generated_at,
    }
  }

  pub fn status_count(&self, status: OrderStatus) -> i64 {
    self.orders_by_status.get(status.as_str()).copied().unwrap_or(0)
  }
}
