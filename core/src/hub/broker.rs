// core/src/hub/broker.rs

use crate::model::LiveMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub type ClientId = Uuid;

/// A serialized message, shared by every client it is fanned out to.
pub type Frame = Arc<str>;

/// Per-client outbound buffer. A client that falls this far behind is dropped.
pub const DEFAULT_CLIENT_BUFFER: usize = 256;

const DEFAULT_COMMAND_BUFFER: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("notification hub is not running")]
pub struct HubClosed;

enum HubCommand {
  Register {
    id: ClientId,
    sender: mpsc::Sender<Frame>,
    respond_to: oneshot::Sender<()>,
  },
  Unregister {
    id: ClientId,
  },
  Broadcast {
    frame: Frame,
  },
  ClientCount {
    respond_to: oneshot::Sender<usize>,
  },
  Shutdown,
}

/// The coordinating task. Owns the client map; nothing else can touch it.
pub struct NotificationHub {
  receiver: mpsc::Receiver<HubCommand>,
  clients: HashMap<ClientId, mpsc::Sender<Frame>>,
}

impl NotificationHub {
  pub fn new(command_buffer: usize, client_buffer: usize) -> (Self, HubHandle) {
    let (sender, receiver) = mpsc::channel(command_buffer);
    let hub = NotificationHub {
      receiver,
      clients: HashMap::new(),
    };
    let handle = HubHandle {
      sender,
      client_buffer: client_buffer.max(1),
    };
    (hub, handle)
  }

  /// Builds a hub and runs it on the current tokio runtime.
  pub fn spawn(client_buffer: usize) -> (HubHandle, JoinHandle<()>) {
    let (hub, handle) = NotificationHub::new(DEFAULT_COMMAND_BUFFER, client_buffer);
    let task = tokio::spawn(hub.run());
    (handle, task)
  }

  /// Processes commands until `Shutdown` or until every handle is dropped.
  #[instrument(name = "notification_hub", skip(self))]
  pub async fn run(mut self) {
    info!("notification hub starting");
    while let Some(command) = self.receiver.recv().await {
      match command {
        HubCommand::Register { id, sender, respond_to } => {
          self.clients.insert(id, sender);
          debug!(client_id = %id, clients = self.clients.len(), "client registered");
          let _ = respond_to.send(());
        }
        HubCommand::Unregister { id } => {
          if self.clients.remove(&id).is_some() {
            debug!(client_id = %id, clients = self.clients.len(), "client unregistered");
          }
        }
        HubCommand::Broadcast { frame } => self.fan_out(frame),
        HubCommand::ClientCount { respond_to } => {
          let _ = respond_to.send(self.clients.len());
        }
        HubCommand::Shutdown => {
          info!("notification hub shutting down");
          break;
        }
      }
    }
    self.clients.clear();
    info!("notification hub stopped");
  }

  /// Hands `frame` to every client without waiting on any of them. Clients
  /// whose buffer is full or whose receiver is gone are removed.
  fn fan_out(&mut self, frame: Frame) {
    let mut dropped = Vec::new();
    for (id, sender) in &self.clients {
      match sender.try_send(Arc::clone(&frame)) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
          warn!(client_id = %id, "client buffer full, dropping client");
          dropped.push(*id);
        }
        Err(TrySendError::Closed(_)) => {
          debug!(client_id = %id, "client gone, dropping");
          dropped.push(*id);
        }
      }
    }
    for id in dropped {
      self.clients.remove(&id);
    }
  }
}

/// Cheap, cloneable entry point to the hub.
#[derive(Clone, Debug)]
pub struct HubHandle {
  sender: mpsc::Sender<HubCommand>,
  client_buffer: usize,
}

impl HubHandle {
  /// Adds a client. The registration is applied before this returns, so a
  /// broadcast sent afterwards reaches it.
  pub async fn register(&self) -> Result<Subscription, HubClosed> {
    let id = Uuid::new_v4();
    let (sender, receiver) = mpsc::channel(self.client_buffer);
    let (ack_tx, ack_rx) = oneshot::channel();
    self
      .sender
      .send(HubCommand::Register {
        id,
        sender,
        respond_to: ack_tx,
      })
      .await
      .map_err(|_| HubClosed)?;
    ack_rx.await.map_err(|_| HubClosed)?;
    Ok(Subscription {
      id,
      receiver,
      hub: self.clone(),
    })
  }

  /// Best effort. A client whose `Subscription` is gone is also removed on
  /// the next broadcast.
  pub fn unregister(&self, id: ClientId) {
    if let Err(e) = self.sender.try_send(HubCommand::Unregister { id }) {
      debug!(client_id = %id, error = %e, "unregister not delivered");
    }
  }

  /// Serializes `message` and queues it for fan-out. Never waits; returns
  /// `false` when the event was dropped.
  pub fn broadcast(&self, message: &LiveMessage) -> bool {
    match serde_json::to_string(message) {
      Ok(json) => self.broadcast_frame(Frame::from(json)),
      Err(e) => {
        warn!(error = %e, "failed to serialize live message");
        false
      }
    }
  }

  pub fn broadcast_frame(&self, frame: Frame) -> bool {
    match self.sender.try_send(HubCommand::Broadcast { frame }) {
      Ok(()) => true,
      Err(TrySendError::Full(_)) => {
        warn!("hub command queue full, broadcast dropped");
        false
      }
      Err(TrySendError::Closed(_)) => {
        warn!("hub stopped, broadcast dropped");
        false
      }
    }
  }

  pub async fn client_count(&self) -> Result<usize, HubClosed> {
    let (tx, rx) = oneshot::channel();
    self
      .sender
      .send(HubCommand::ClientCount { respond_to: tx })
      .await
      .map_err(|_| HubClosed)?;
    rx.await.map_err(|_| HubClosed)
  }

  pub async fn shutdown(&self) {
    let _ = self.sender.send(HubCommand::Shutdown).await;
  }
}

/// A registered client's inbox. Dropping it unregisters the client.
pub struct Subscription {
  id: ClientId,
  receiver: mpsc::Receiver<Frame>,
  hub: HubHandle,
}

impl Subscription {
  pub fn id(&self) -> ClientId {
    self.id
  }

  /// Next frame, or `None` once the hub has dropped this client.
  pub async fn recv(&mut self) -> Option<Frame> {
    self.receiver.recv().await
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.hub.unregister(self.id);
  }
}
