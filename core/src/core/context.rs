// core/src/core/context.rs

//! The boxed handler type stored by a `Pipeline`.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Future returned by a stored handler.
pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>;

/// A registered step handler.
///
/// Handlers get their own clone of the run's `ContextData<TData>`, take locks
/// only for as long as they need to copy values in or out, and never hold a
/// guard across an `.await`.
pub type Handler<TData, Err> = Box<dyn Fn(ContextData<TData>) -> HandlerFuture<Err> + Send + Sync>;
