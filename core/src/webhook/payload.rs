// core/src/webhook/payload.rs

use crate::model::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
  pub event: String,
  #[serde(default)]
  pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
  #[serde(default)]
  pub id: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub metadata: Option<WebhookMetadata>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub payment_method: Option<String>,
  #[serde(default)]
  pub paid_at: Option<String>,
  #[serde(default)]
  pub failed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMetadata {
  #[serde(default)]
  pub order_id: Option<String>,
}

/// Which payment state an event type maps to, and where its timestamp lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub status: PaymentStatus,
  pub timestamp_field: TimestampField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
  PaidAt,
  FailedAt,
}

/// `None` for event types this gateway does not act on.
pub fn route(event_type: &str) -> Option<Route> {
  match event_type {
    "payment.completed" | "invoice.paid" => Some(Route {
      status: PaymentStatus::Paid,
      timestamp_field: TimestampField::PaidAt,
    }),
    "payment.failed" => Some(Route {
      status: PaymentStatus::Failed,
      timestamp_field: TimestampField::FailedAt,
    }),
    _ => None,
  }
}

impl WebhookData {
  /// The event's RFC 3339 timestamp, or `received_at` when absent or unparseable.
  pub fn occurred_at(&self, field: TimestampField, received_at: DateTime<Utc>) -> DateTime<Utc> {
    let raw = match field {
      TimestampField::PaidAt => self.paid_at.as_deref(),
      TimestampField::FailedAt => self.failed_at.as_deref(),
    };
    raw
      .filter(|s| !s.trim().is_empty())
      .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
      .map(|t| t.with_timezone(&Utc))
      .unwrap_or(received_at)
  }

  pub fn payment_method(&self) -> Option<String> {
    self
      .payment_method
      .as_deref()
      .map(str::trim)
      .filter(|m| !m.is_empty())
      .map(str::to_string)
  }
}
