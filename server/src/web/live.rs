// server/src/web/live.rs

//! `GET /live`: authenticated WebSocket upgrade feeding the notification hub
//! to a dashboard.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Item, Message, MessageStream, Session};
use async_trait::async_trait;
use futures_util::StreamExt;
use orderdesk::hub::{run_session, InboundFrame, LiveSink, LiveSource, SessionTimings, SinkClosed};
use tracing::{debug, info, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{bearer_or_query_token, AuthenticatedPrincipal};

#[derive(Clone)]
struct WsSink(Session);

#[async_trait(?Send)]
impl LiveSink for WsSink {
  async fn send_text(&mut self, text: &str) -> Result<(), SinkClosed> {
    self.0.text(text.to_string()).await.map_err(|_| SinkClosed)
  }

  async fn ping(&mut self) -> Result<(), SinkClosed> {
    self.0.ping(b"").await.map_err(|_| SinkClosed)
  }

  async fn pong(&mut self, payload: &[u8]) -> Result<(), SinkClosed> {
    self.0.pong(payload).await.map_err(|_| SinkClosed)
  }

  async fn close(self) {
    let _ = self.0.close(None).await;
  }
}

struct WsSource(MessageStream);

#[async_trait(?Send)]
impl LiveSource for WsSource {
  async fn next_frame(&mut self) -> Option<InboundFrame> {
    loop {
      let frame = match self.0.next().await? {
        Ok(msg) => msg,
        Err(e) => {
          debug!(error = %e, "websocket protocol error");
          return None;
        }
      };
      return Some(match frame {
        Message::Ping(payload) => InboundFrame::Ping(payload.to_vec()),
        Message::Pong(_) => InboundFrame::Pong,
        Message::Text(text) => InboundFrame::Data(text.len()),
        Message::Binary(bytes) => InboundFrame::Data(bytes.len()),
        Message::Continuation(item) => InboundFrame::Data(match item {
          Item::FirstText(b) | Item::FirstBinary(b) | Item::Continue(b) | Item::Last(b) => b.len(),
        }),
        Message::Close(_) => InboundFrame::Close,
        Message::Nop => continue,
      });
    }
  }
}

#[instrument(name = "handler::live", skip_all)]
pub async fn live_handler(
  app_state: web::Data<AppState>,
  req: HttpRequest,
  body: web::Payload,
) -> Result<HttpResponse, AppError> {
  let principal = AuthenticatedPrincipal::authenticate(&app_state, bearer_or_query_token(&req)).await?;

  let subscription = app_state
    .hub
    .register()
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?;
  let (response, session, stream) = actix_ws::handle(&req, body).map_err(|e| AppError::validation(e.to_string()))?;

  info!(principal_id = %principal.principal_id, client_id = %subscription.id(), "live viewer connected");
  // Session futures are !Send; they run on this worker's local set.
  actix_rt::spawn(async move {
    let end = run_session(subscription, WsSink(session), WsSource(stream), SessionTimings::default()).await;
    info!(reason = ?end, "live viewer disconnected");
  });

  Ok(response)
}
