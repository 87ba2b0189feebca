// core/src/hub/mod.rs

//! Notification Hub: one task owns the set of live clients and does all
//! registration and fan-out. Everything else talks to it over a channel.

pub mod broker;
pub mod session;

pub use broker::{ClientId, Frame, HubClosed, HubHandle, NotificationHub, Subscription, DEFAULT_CLIENT_BUFFER};
pub use session::{run_session, InboundFrame, LiveSink, LiveSource, SessionEnd, SessionTimings, SinkClosed};
