// server/src/web/handlers/webhook_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{info, instrument};

use super::ok;
use crate::errors::AppError;
use crate::state::AppState;

/// Payment provider callback. Answers 200 for every delivery whose signature
/// checks out, including ones that match no order; the provider only ever
/// sees a failure for a bad signature, an unreadable body or a storage outage.
#[instrument(name = "handler::payment_webhook", skip_all, fields(payload_len = body.len()))]
pub async fn payment_webhook_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Bytes,
) -> Result<HttpResponse, AppError> {
  let signature = req
    .headers()
    .get(app_state.config.webhook_signature_header.as_str())
    .and_then(|h| h.to_str().ok());

  let outcome = app_state.gateway.handle(&body, signature).await?;
  info!(?outcome, "webhook acknowledged");
  Ok(ok(outcome))
}
