// core/src/pipeline/execution.rs

//! `Pipeline::run()`.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::PipelineError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, info_span, instrument, Instrument, Level};

/// Result of running one phase's handler list.
enum PhaseOutcome {
  Continue,
  Stopped,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Executes every step against `ctx_data`, in definition order.
  ///
  /// For each step: the skip condition is evaluated, then all `before`, `on`
  /// and `after` handlers run in registration order. The first `Stop` ends the
  /// run with `PipelineResult::Stopped`; the first error ends it with that
  /// error.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "pipeline run starting");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = info_span!(
        "pipeline_step",
        step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          event!(parent: &step_span, Level::DEBUG, "step skipped by skip_if condition");
          continue;
        }
      }

      let before = self.before.get(step_name).filter(|v| !v.is_empty());
      let on = self.on.get(step_name).filter(|v| !v.is_empty());
      let after = self.after.get(step_name).filter(|v| !v.is_empty());

      if before.is_none() && on.is_none() && after.is_none() {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "optional step has no handlers, skipping");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "required step has no handlers");
        return Err(Err::from(PipelineError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      for (phase, handlers) in [("before", before), ("on", on), ("after", after)] {
        let Some(handlers) = handlers else { continue };
        let outcome = run_phase(handlers, &ctx_data, phase)
          .instrument(step_span.clone())
          .await?;
        if let PhaseOutcome::Stopped = outcome {
          return Ok(PipelineResult::Stopped);
        }
      }
    }

    event!(Level::DEBUG, "pipeline run completed");
    Ok(PipelineResult::Completed)
  }
}

async fn run_phase<TData, Err>(
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
  phase: &'static str,
) -> Result<PhaseOutcome, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    match handler_fn(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => {
        event!(Level::INFO, phase, handler_index = handler_idx, "pipeline stopped by handler");
        return Ok(PhaseOutcome::Stopped);
      }
      Err(e) => {
        event!(Level::WARN, phase, handler_index = handler_idx, error = %e, "handler failed");
        return Err(e);
      }
    }
  }
  Ok(PhaseOutcome::Continue)
}
