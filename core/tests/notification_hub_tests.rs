// tests/notification_hub_tests.rs
mod common;

use async_trait::async_trait;
use common::setup_tracing;
use orderdesk::hub::{
  run_session, Frame, HubClosed, InboundFrame, LiveSink, LiveSource, NotificationHub, SessionEnd, SessionTimings,
  SinkClosed,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
  Text(String),
  Ping,
  Pong(Vec<u8>),
  Closed,
}

/// Records everything written to it. `stall` makes text writes hang,
/// `stall_pongs` does the same for pongs.
#[derive(Clone, Default)]
struct RecordingSink {
  log: Arc<Mutex<Vec<Sent>>>,
  stall: bool,
  stall_pongs: bool,
}

impl RecordingSink {
  fn sent(&self) -> Vec<Sent> {
    self.log.lock().clone()
  }
}

#[async_trait(?Send)]
impl LiveSink for RecordingSink {
  async fn send_text(&mut self, text: &str) -> Result<(), SinkClosed> {
    if self.stall {
      std::future::pending::<()>().await;
    }
    self.log.lock().push(Sent::Text(text.to_string()));
    Ok(())
  }

  async fn ping(&mut self) -> Result<(), SinkClosed> {
    self.log.lock().push(Sent::Ping);
    Ok(())
  }

  async fn pong(&mut self, payload: &[u8]) -> Result<(), SinkClosed> {
    if self.stall_pongs {
      std::future::pending::<()>().await;
    }
    self.log.lock().push(Sent::Pong(payload.to_vec()));
    Ok(())
  }

  async fn close(self) {
    self.log.lock().push(Sent::Closed);
  }
}

/// Yields whatever the test pushes; pends while the sender is alive and idle.
struct ScriptedSource {
  frames: mpsc::UnboundedReceiver<InboundFrame>,
}

#[async_trait(?Send)]
impl LiveSource for ScriptedSource {
  async fn next_frame(&mut self) -> Option<InboundFrame> {
    self.frames.recv().await
  }
}

fn scripted(frames: Vec<InboundFrame>) -> (mpsc::UnboundedSender<InboundFrame>, ScriptedSource) {
  let (tx, rx) = mpsc::unbounded_channel();
  for frame in frames {
    tx.send(frame).unwrap();
  }
  (tx, ScriptedSource { frames: rx })
}

#[tokio::test]
async fn broadcast_reaches_every_registered_client() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let mut a = hub.register().await.unwrap();
  let mut b = hub.register().await.unwrap();
  assert_ne!(a.id(), b.id());
  assert_eq!(hub.client_count().await.unwrap(), 2);

  assert!(hub.broadcast_frame(Frame::from("hello")));
  assert_eq!(a.recv().await.as_deref(), Some("hello"));
  assert_eq!(b.recv().await.as_deref(), Some("hello"));
}

#[tokio::test]
async fn slow_client_is_dropped_without_blocking_others() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(2);
  let mut fast = hub.register().await.unwrap();
  let mut slow = hub.register().await.unwrap();

  for n in 0..3 {
    assert!(hub.broadcast_frame(Frame::from(format!("m{}", n))));
    assert_eq!(fast.recv().await.as_deref(), Some(format!("m{}", n).as_str()));
  }
  assert_eq!(hub.client_count().await.unwrap(), 1);

  // The slow client keeps what was buffered, then sees the end of its stream.
  assert_eq!(slow.recv().await.as_deref(), Some("m0"));
  assert_eq!(slow.recv().await.as_deref(), Some("m1"));
  assert_eq!(slow.recv().await, None);
}

#[tokio::test]
async fn dropping_a_subscription_unregisters_it() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let sub = hub.register().await.unwrap();
  let _other = hub.register().await.unwrap();
  drop(sub);
  assert_eq!(hub.client_count().await.unwrap(), 1);
}

#[tokio::test]
async fn shutdown_ends_every_stream() {
  setup_tracing();
  let (hub, task) = NotificationHub::spawn(8);
  let mut sub = hub.register().await.unwrap();

  hub.shutdown().await;
  task.await.unwrap();

  assert_eq!(sub.recv().await, None);
  assert_eq!(hub.register().await.err(), Some(HubClosed));
  assert!(!hub.broadcast_frame(Frame::from("late")));
}

#[tokio::test(start_paused = true)]
async fn session_writes_frames_and_answers_pings() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let sub = hub.register().await.unwrap();
  hub.broadcast_frame(Frame::from("{\"type\":\"order_update\"}"));

  let sink = RecordingSink::default();
  let (_keep_open, source) = scripted(vec![InboundFrame::Ping(b"hi".to_vec())]);

  let stopper = hub.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_secs(1)).await;
    stopper.shutdown().await;
  });

  let end = run_session(sub, sink.clone(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::HubDropped);

  let sent = sink.sent();
  assert!(sent.contains(&Sent::Text("{\"type\":\"order_update\"}".into())));
  assert!(sent.contains(&Sent::Pong(b"hi".to_vec())));
  assert_eq!(sent.last(), Some(&Sent::Closed));
}

#[tokio::test(start_paused = true)]
async fn silent_client_times_out_after_keepalive_pings() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let sub = hub.register().await.unwrap();
  let sink = RecordingSink::default();
  let (_keep_open, source) = scripted(vec![]);

  let end = run_session(sub, sink.clone(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::ReadTimeout);
  // One ping at 54s, read deadline at 60s.
  assert_eq!(sink.sent(), vec![Sent::Ping, Sent::Closed]);
  assert_eq!(hub.client_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn client_close_and_oversized_frames_end_the_session() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);

  let (_tx, source) = scripted(vec![InboundFrame::Pong, InboundFrame::Data(12), InboundFrame::Close]);
  let end = run_session(hub.register().await.unwrap(), RecordingSink::default(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::ClientClosed);

  let (_tx, source) = scripted(vec![InboundFrame::Data(4096)]);
  let end = run_session(hub.register().await.unwrap(), RecordingSink::default(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::FrameTooLarge);

  let (tx, source) = scripted(vec![]);
  drop(tx);
  let end = run_session(hub.register().await.unwrap(), RecordingSink::default(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::ClientClosed);

  assert_eq!(hub.client_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_writes_time_out() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let sub = hub.register().await.unwrap();
  hub.broadcast_frame(Frame::from("stuck"));

  let sink = RecordingSink {
    stall: true,
    ..Default::default()
  };
  let (_keep_open, source) = scripted(vec![]);
  let end = run_session(sub, sink.clone(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::WriteTimeout);
  assert_eq!(sink.sent(), vec![Sent::Closed]);
}

#[tokio::test(start_paused = true)]
async fn stalled_pongs_time_out() {
  setup_tracing();
  let (hub, _task) = NotificationHub::spawn(8);
  let sub = hub.register().await.unwrap();

  let sink = RecordingSink {
    stall_pongs: true,
    ..Default::default()
  };
  let (_keep_open, source) = scripted(vec![InboundFrame::Ping(b"hi".to_vec())]);
  let started = tokio::time::Instant::now();
  let end = run_session(sub, sink.clone(), source, SessionTimings::default()).await;
  assert_eq!(end, SessionEnd::WriteTimeout);
  // Ends at the write deadline, before the first keepalive ping.
  let timings = SessionTimings::default();
  assert!(started.elapsed() >= timings.write_timeout);
  assert!(started.elapsed() < timings.ping_interval);
  assert_eq!(sink.sent(), vec![Sent::Closed]);
  assert_eq!(hub.client_count().await.unwrap(), 0);
}
