// core/src/webhook/mod.rs

//! Webhook Gateway for payment provider callbacks.
//!
//! Each delivery runs the pipeline
//! `verify_signature -> parse_payload -> route_event -> apply_event`.
//! Nothing is parsed before the signature checks out. Once it does, the
//! delivery is acknowledged whatever happens to the order lookup; events we
//! cannot match are stored for manual reconciliation instead.

pub mod payload;
pub mod resolver;
pub mod signature;

use crate::core::{ContextData, PipelineControl, SkipCondition};
use crate::error::{Error, Result};
use crate::orders::{OrderEngine, PaymentOutcome, PaymentUpdate};
use crate::pipeline::Pipeline;
use crate::store::UnresolvedWebhook;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub use payload::{route, Route, WebhookData, WebhookEvent};
pub use resolver::{extract_reference, OrderReferenceResolver, ReferenceSource};
pub use signature::{sign_payload, verify_signature};

pub const STEP_VERIFY: &str = "verify_signature";
pub const STEP_PARSE: &str = "parse_payload";
pub const STEP_ROUTE: &str = "route_event";
pub const STEP_APPLY: &str = "apply_event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStage {
  Received,
  SignatureVerified,
  Parsed,
  Routed,
  Applied,
  Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "payment", rename_all = "snake_case")]
pub enum WebhookOutcome {
  Applied(PaymentOutcome),
  /// An event type we do not act on.
  Ignored,
  /// Parsed, but no order matched; recorded for manual reconciliation.
  Unresolved,
}

#[derive(Debug)]
pub struct WebhookCtx {
  pub body: Vec<u8>,
  pub signature: Option<String>,
  pub received_at: DateTime<Utc>,
  pub stage: WebhookStage,
  pub raw: Option<serde_json::Value>,
  pub event: Option<WebhookEvent>,
  pub route: Option<Route>,
  pub outcome: Option<WebhookOutcome>,
}

impl WebhookCtx {
  fn new(body: Vec<u8>, signature: Option<String>) -> Self {
    WebhookCtx {
      body,
      signature,
      received_at: Utc::now(),
      stage: WebhookStage::Received,
      raw: None,
      event: None,
      route: None,
      outcome: None,
    }
  }
}

pub struct WebhookGateway {
  pipeline: Pipeline<WebhookCtx, Error>,
}

impl WebhookGateway {
  pub fn new(secret: impl Into<Vec<u8>>, engine: Arc<OrderEngine>) -> Self {
    WebhookGateway {
      pipeline: build_pipeline(Arc::new(secret.into()), engine),
    }
  }

  /// Processes one delivery. Errors are `UpstreamSignature` (bad or missing
  /// signature) and `Validation` (body is not a webhook event); storage
  /// failures propagate so the provider retries.
  #[instrument(name = "webhook::handle", skip_all, fields(body_len = body.len()), err(Display))]
  pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
    let ctx = ContextData::new(WebhookCtx::new(body.to_vec(), signature.map(str::to_string)));
    self.pipeline.run(ctx.clone()).await?;
    let (outcome, stage) = ctx.with(|c| (c.outcome, c.stage));
    info!(?stage, ?outcome, "webhook processed");
    Ok(outcome.unwrap_or(WebhookOutcome::Ignored))
  }
}

fn reject(ctx: &ContextData<WebhookCtx>, err: Error) -> Error {
  ctx.write().stage = WebhookStage::Rejected;
  err
}

fn build_pipeline(secret: Arc<Vec<u8>>, engine: Arc<OrderEngine>) -> Pipeline<WebhookCtx, Error> {
  // Event types without a route are acknowledged as ignored, never applied.
  let unrouted: SkipCondition<WebhookCtx> = Arc::new(|ctx: ContextData<WebhookCtx>| ctx.read().route.is_none());
  let mut pipeline = Pipeline::new(&[
    (STEP_VERIFY, false, None),
    (STEP_PARSE, false, None),
    (STEP_ROUTE, false, None),
    (STEP_APPLY, false, Some(unrouted)),
  ]);

  pipeline.on_root(STEP_VERIFY, move |ctx: ContextData<WebhookCtx>| {
    let secret = secret.clone();
    async move {
      let valid = ctx.with(|c| match c.signature.as_deref() {
        Some(sig) if !sig.trim().is_empty() => verify_signature(&secret, &c.body, sig),
        _ => false,
      });
      if !valid {
        warn!("webhook signature rejected");
        return Err(reject(&ctx, Error::UpstreamSignature));
      }
      ctx.write().stage = WebhookStage::SignatureVerified;
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  pipeline.on_root(STEP_PARSE, |ctx: ContextData<WebhookCtx>| async move {
    let parsed = ctx.with(|c| serde_json::from_slice::<serde_json::Value>(&c.body));
    let raw = parsed.map_err(|e| reject(&ctx, Error::validation(format!("invalid JSON payload: {}", e))))?;
    let event = serde_json::from_value::<WebhookEvent>(raw.clone())
      .map_err(|e| reject(&ctx, Error::validation(format!("not a webhook event: {}", e))))?;

    let mut guard = ctx.write();
    guard.raw = Some(raw);
    guard.event = Some(event);
    guard.stage = WebhookStage::Parsed;
    Ok::<_, Error>(PipelineControl::Continue)
  });

  pipeline.on_root(STEP_ROUTE, |ctx: ContextData<WebhookCtx>| async move {
    let event_type = ctx.with(|c| c.event.as_ref().map(|e| e.event.clone()).unwrap_or_default());
    let routed = route(&event_type);
    if routed.is_none() {
      info!(%event_type, "webhook event type ignored");
    }
    let mut guard = ctx.write();
    guard.stage = WebhookStage::Routed;
    guard.route = routed;
    if routed.is_none() {
      guard.outcome = Some(WebhookOutcome::Ignored);
    }
    Ok::<_, Error>(PipelineControl::Continue)
  });

  pipeline.on_root(STEP_APPLY, move |ctx: ContextData<WebhookCtx>| {
    let engine = engine.clone();
    async move {
      let (event, route, raw, received_at) = ctx.with(|c| (c.event.clone(), c.route, c.raw.clone(), c.received_at));
      let (Some(event), Some(route)) = (event, route) else {
        return Err(Error::Integrity("apply_event ran without a routed event".to_string()));
      };

      let resolved = OrderReferenceResolver::new(&engine).resolve(&event.data).await;
      let (order_id, source) = match resolved {
        Ok(found) => found,
        Err(Error::Resolution(reason)) => {
          record_unresolved(&engine, &event, raw, &reason, received_at).await;
          let mut guard = ctx.write();
          guard.stage = WebhookStage::Rejected;
          guard.outcome = Some(WebhookOutcome::Unresolved);
          return Ok(PipelineControl::Stop);
        }
        Err(other) => return Err(other),
      };
      if source == ReferenceSource::Description {
        warn!(%order_id, "order resolved from description text, metadata.order_id missing");
      }

      let update = PaymentUpdate {
        status: route.status,
        method: event.data.payment_method(),
        occurred_at: event.data.occurred_at(route.timestamp_field, received_at),
        source: Some(format!("webhook:{}", event.event)),
      };
      let outcome = engine.update_payment_status(order_id, update).await?;

      let mut guard = ctx.write();
      guard.stage = WebhookStage::Applied;
      guard.outcome = Some(WebhookOutcome::Applied(outcome));
      Ok::<_, Error>(PipelineControl::Continue)
    }
  });

  pipeline
}

async fn record_unresolved(
  engine: &OrderEngine,
  event: &WebhookEvent,
  raw: Option<serde_json::Value>,
  reason: &str,
  received_at: DateTime<Utc>,
) {
  warn!(event_type = %event.event, payment_id = ?event.data.id, %reason, "webhook could not be matched to an order");
  let entry = UnresolvedWebhook {
    id: Uuid::new_v4(),
    event_type: event.event.clone(),
    reference: extract_reference(&event.data).map(|(r, _)| r),
    reason: reason.to_string(),
    payload: raw.unwrap_or(serde_json::Value::Null),
    received_at,
  };
  if let Err(e) = engine.store().record_unresolved_webhook(&entry).await {
    error!(error = %e, "failed to record unresolved webhook");
  }
}
