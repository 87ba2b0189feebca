// core/src/pipeline/definition.rs

use crate::core::context::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::PipelineError;
use std::collections::HashMap;

/// An ordered list of named steps plus the handlers registered for each of
/// their phases.
///
/// `TData` is the per-run context, `Err` the error every handler resolves to.
/// `Err: From<PipelineError>` lets the engine report its own failures (a
/// required step without handlers) through the caller's error type.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,

  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples, in run order.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_cond_opt)| StepDef {
        name: (*name).to_string(),
        optional: *optional,
        skip_if: skip_cond_opt.clone(),
      })
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Panics when `step_name` is not part of the definition. A typo in a step
  /// name is a wiring bug, caught the first time the pipeline is built.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!("pipeline setup error: step '{}' not found in pipeline definition", step_name);
    }
  }
}
