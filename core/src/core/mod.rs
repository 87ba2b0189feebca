// core/src/core/mod.rs

pub mod context;
pub mod context_data;
pub mod control;
pub mod step;

pub use context::{Handler, HandlerFuture};
pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use step::{SkipCondition, StepDef};
