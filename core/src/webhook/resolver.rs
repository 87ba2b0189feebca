// core/src/webhook/resolver.rs

//! Finds the order a payment event is about.
//!
//! Structured metadata is tried first. The description fallback scrapes the
//! text after the first `#`, which only works while the upstream integration
//! keeps writing descriptions like `Payment for Order #ORD-...`.

use super::payload::WebhookData;
use crate::error::{Error, Result};
use crate::orders::OrderEngine;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
  Metadata,
  Description,
}

/// The raw reference an event carries, before it is looked up.
pub fn extract_reference(data: &WebhookData) -> Option<(String, ReferenceSource)> {
  let from_metadata = data
    .metadata
    .as_ref()
    .and_then(|m| m.order_id.as_deref())
    .map(str::trim)
    .filter(|s| !s.is_empty());
  if let Some(reference) = from_metadata {
    return Some((reference.to_string(), ReferenceSource::Metadata));
  }

  data
    .description
    .as_deref()
    .and_then(reference_from_description)
    .map(|r| (r, ReferenceSource::Description))
}

/// `"Payment for Order #ORD-20250101120000-0001 (web)"` -> `ORD-20250101120000-0001`.
pub fn reference_from_description(description: &str) -> Option<String> {
  let (_, rest) = description.split_once('#')?;
  let segment = rest.split('#').next().unwrap_or(rest);
  segment
    .split_whitespace()
    .next()
    .map(|token| token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric()))
    .filter(|token| !token.is_empty())
    .map(str::to_string)
}

pub struct OrderReferenceResolver<'a> {
  engine: &'a OrderEngine,
}

impl<'a> OrderReferenceResolver<'a> {
  pub fn new(engine: &'a OrderEngine) -> Self {
    OrderReferenceResolver { engine }
  }

  /// `Error::Resolution` when the event names no known order.
  pub async fn resolve(&self, data: &WebhookData) -> Result<(Uuid, ReferenceSource)> {
    let Some((reference, source)) = extract_reference(data) else {
      return Err(Error::Resolution("event carries no order reference".to_string()));
    };
    match self.engine.resolve_reference(&reference).await? {
      Some(id) => Ok((id, source)),
      None => Err(Error::Resolution(format!("no order matches reference '{}'", reference))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::webhook::payload::WebhookMetadata;

  #[test]
  fn metadata_wins_over_description() {
    let data = WebhookData {
      metadata: Some(WebhookMetadata {
        order_id: Some(" ORD-1 ".into()),
      }),
      description: Some("Order #ORD-2".into()),
      ..Default::default()
    };
    assert_eq!(extract_reference(&data), Some(("ORD-1".into(), ReferenceSource::Metadata)));
  }

  #[test]
  fn description_fallback() {
    assert_eq!(
      reference_from_description("Payment for Order #ORD-20250101120000-0001"),
      Some("ORD-20250101120000-0001".into())
    );
    assert_eq!(
      reference_from_description("Invoice for Order # ORD-9 (retry).").as_deref(),
      Some("ORD-9")
    );
    assert_eq!(reference_from_description("no marker here"), None);
    assert_eq!(reference_from_description("trailing #"), None);
  }

  #[test]
  fn empty_metadata_falls_through() {
    let data = WebhookData {
      metadata: Some(WebhookMetadata { order_id: Some("  ".into()) }),
      description: Some("Order #ORD-3".into()),
      ..Default::default()
    };
    assert_eq!(extract_reference(&data), Some(("ORD-3".into(), ReferenceSource::Description)));
  }
}
