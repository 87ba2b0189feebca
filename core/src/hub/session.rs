// core/src/hub/session.rs

//! The two loops every live connection runs.
//!
//! The writer drains the client's `Subscription` and sends keepalive pings.
//! The reader only watches for liveness: any inbound frame refreshes its
//! deadline, a close frame or silence ends it. Every write from either loop,
//! pongs included, has a deadline.
//! Whichever loop ends first ends the session, which drops the subscription
//! and so unregisters the client.
//!
//! The transport is abstracted by `LiveSink` / `LiveSource` so the loops run
//! the same over a WebSocket and over an in-memory test double.

use super::broker::Subscription;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, instrument};

pub const PING_INTERVAL: Duration = Duration::from_secs(54);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Inbound frames larger than this end the session.
pub const MAX_INBOUND_FRAME: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
  pub ping_interval: Duration,
  pub write_timeout: Duration,
  pub read_timeout: Duration,
  pub max_inbound_frame: usize,
}

impl Default for SessionTimings {
  fn default() -> Self {
    SessionTimings {
      ping_interval: PING_INTERVAL,
      write_timeout: WRITE_TIMEOUT,
      read_timeout: READ_TIMEOUT,
      max_inbound_frame: MAX_INBOUND_FRAME,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("live connection closed")]
pub struct SinkClosed;

/// Outbound half of a live connection. Clones share the connection.
#[async_trait(?Send)]
pub trait LiveSink: Clone {
  async fn send_text(&mut self, text: &str) -> Result<(), SinkClosed>;
  async fn ping(&mut self) -> Result<(), SinkClosed>;
  async fn pong(&mut self, payload: &[u8]) -> Result<(), SinkClosed>;
  async fn close(self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
  Ping(Vec<u8>),
  Pong,
  /// A text or binary frame; only its size matters here.
  Data(usize),
  Close,
}

/// Inbound half of a live connection.
#[async_trait(?Send)]
pub trait LiveSource {
  /// `None` when the stream ended or failed.
  async fn next_frame(&mut self) -> Option<InboundFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
  /// The hub dropped this client (slow consumer or hub shutdown).
  HubDropped,
  WriteFailed,
  WriteTimeout,
  ClientClosed,
  ReadTimeout,
  FrameTooLarge,
}

async fn write_loop<S: LiveSink>(subscription: &mut Subscription, mut sink: S, timings: SessionTimings) -> SessionEnd {
  let mut ticker = interval_at(Instant::now() + timings.ping_interval, timings.ping_interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      frame = subscription.recv() => {
        let Some(frame) = frame else { return SessionEnd::HubDropped };
        match timeout(timings.write_timeout, sink.send_text(&frame)).await {
          Ok(Ok(())) => {}
          Ok(Err(SinkClosed)) => return SessionEnd::WriteFailed,
          Err(_) => return SessionEnd::WriteTimeout,
        }
      }
      _ = ticker.tick() => {
        match timeout(timings.write_timeout, sink.ping()).await {
          Ok(Ok(())) => {}
          Ok(Err(SinkClosed)) => return SessionEnd::WriteFailed,
          Err(_) => return SessionEnd::WriteTimeout,
        }
      }
    }
  }
}

async fn read_loop<R: LiveSource, S: LiveSink>(source: &mut R, mut sink: S, timings: SessionTimings) -> SessionEnd {
  loop {
    match timeout(timings.read_timeout, source.next_frame()).await {
      Err(_) => return SessionEnd::ReadTimeout,
      Ok(None) | Ok(Some(InboundFrame::Close)) => return SessionEnd::ClientClosed,
      Ok(Some(InboundFrame::Ping(payload))) => {
        match timeout(timings.write_timeout, sink.pong(&payload)).await {
          Ok(Ok(())) => {}
          Ok(Err(SinkClosed)) => return SessionEnd::WriteFailed,
          Err(_) => return SessionEnd::WriteTimeout,
        }
      }
      Ok(Some(InboundFrame::Pong)) => {}
      Ok(Some(InboundFrame::Data(len))) => {
        if len > timings.max_inbound_frame {
          return SessionEnd::FrameTooLarge;
        }
      }
    }
  }
}

/// Drives a registered client until either loop ends, then closes the sink.
/// The subscription is consumed, which unregisters the client.
#[instrument(name = "live_session", skip_all, fields(client_id = %subscription.id()))]
pub async fn run_session<S, R>(mut subscription: Subscription, sink: S, mut source: R, timings: SessionTimings) -> SessionEnd
where
  S: LiveSink,
  R: LiveSource,
{
  let end = tokio::select! {
    end = write_loop(&mut subscription, sink.clone(), timings) => end,
    end = read_loop(&mut source, sink.clone(), timings) => end,
  };
  debug!(reason = ?end, "live session ended");
  drop(subscription);
  sink.close().await;
  end
}
