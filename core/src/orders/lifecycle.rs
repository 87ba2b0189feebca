// core/src/orders/lifecycle.rs

use crate::model::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What `update_payment_status` did with a payment event. Every outcome
/// appends an audit row; only `Applied` changes the order and broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
  Applied,
  /// Redelivery of the state already recorded.
  Unchanged,
  /// Older than the last applied event, or the order is already `paid`.
  Stale,
}

/// A payment event to reconcile against an order.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
  pub status: PaymentStatus,
  pub method: Option<String>,
  pub occurred_at: DateTime<Utc>,
  /// Who reported it, e.g. `webhook:payment.completed`.
  pub source: Option<String>,
}

/// Decides how a payment event relates to the recorded payment state.
///
/// Events are ordered by occurrence time: the newest one wins, except that
/// `paid` is never replaced.
pub fn reconcile(
  current: PaymentStatus,
  last_applied_at: Option<DateTime<Utc>>,
  incoming: PaymentStatus,
  occurred_at: DateTime<Utc>,
) -> PaymentOutcome {
  if current == incoming {
    return PaymentOutcome::Unchanged;
  }
  if last_applied_at.is_some_and(|last| occurred_at < last) {
    return PaymentOutcome::Stale;
  }
  if current.can_transition_to(incoming) {
    PaymentOutcome::Applied
  } else {
    PaymentOutcome::Stale
  }
}

pub(crate) fn payment_note(outcome: PaymentOutcome, current: PaymentStatus, incoming: PaymentStatus) -> String {
  match outcome {
    PaymentOutcome::Applied => incoming.history_note(),
    PaymentOutcome::Unchanged => format!("{} (duplicate delivery)", incoming.history_note()),
    PaymentOutcome::Stale => format!("Ignored {} event: payment already {}", incoming, current),
  }
}
