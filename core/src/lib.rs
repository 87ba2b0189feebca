// core/src/lib.rs

//! orderdesk: order lifecycle, payment webhook reconciliation, bearer-token
//! sessions and live order broadcasts.
//!
//! Multi-stage operations (order creation, webhook ingestion) run on a small
//! async step engine (`Pipeline`), where each named step has `before`, `on`
//! and `after` handlers sharing one `ContextData<T>`.
//!
//! Storage goes through the traits in [`store`], with a PostgreSQL adapter
//! and an in-process one.

pub mod auth;
pub mod core;
pub mod error;
pub mod hub;
pub mod model;
pub mod orders;
pub mod pipeline;
pub mod store;
pub mod webhook;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::StepDef;
pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{AuthError, Error, PipelineError, Result};

pub use crate::auth::{Claims, TokenConfig, TokenService};
pub use crate::hub::{HubHandle, NotificationHub};
pub use crate::orders::OrderEngine;
pub use crate::webhook::{WebhookGateway, WebhookOutcome};
