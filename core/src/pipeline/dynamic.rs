// piper/src/pipeline/dynamic.rs

//! Construction of pipelines from runtime-typed stages.

use crate::channel::handoff;
use crate::config::PipelineConfig;
use crate::error::{PiperError, PiperResult};
use crate::pipeline::definition::Pipeline;
use crate::stage::definition::{DynStage, TypeTag};
use crate::stage::validate::validate_chain;
use crate::worker::WorkerPool;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

impl<In, Out> Pipeline<In, Out>
where
  In: Send + 'static,
  Out: Send + 'static,
{
  /// Builds a pipeline from stages whose types are only known at runtime.
  ///
  /// See [`from_stages_with_config`](Self::from_stages_with_config).
  pub fn from_stages(stages: Vec<DynStage>) -> PiperResult<Self> {
    Self::from_stages_with_config(PipelineConfig::default(), stages)
  }

  /// Validates the stage chain, then starts it.
  ///
  /// Fails with [`PiperError::NoStages`] on an empty list and with
  /// [`PiperError::TypeMismatch`] when `In`, the stages' declared types and
  /// `Out` do not line up. No worker is started on failure. On success an
  /// output monitor task feeds the typed output channel.
  #[instrument(
    name = "Pipeline::from_stages",
    skip_all,
    fields(pipeline = %config.name(), num_stages = stages.len()),
    err(Display)
  )]
  pub fn from_stages_with_config(config: PipelineConfig, stages: Vec<DynStage>) -> PiperResult<Self> {
    validate_chain(TypeTag::of::<In>(), &stages, TypeTag::of::<Out>())?;
    let runtime = Handle::try_current().map_err(|_| PiperError::RuntimeUnavailable)?;

    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::new(runtime, &config, cancel.clone());
    let (input_tx, input_rx) = handoff::<In>();

    let mut stages = stages.into_iter();
    let first = stages.next().ok_or(PiperError::NoStages)?;
    let mut upstream = pool.spawn_stage(first.with_typed_input::<In>(), input_rx);
    for stage in stages {
      upstream = pool.spawn_stage(stage.into_stage(), upstream);
    }
    let output = pool.spawn_output_monitor::<Out>(upstream);

    let pipeline = Pipeline::from_parts(&config, input_tx, output, pool, cancel);
    event!(Level::DEBUG, workers = pipeline.worker_count(), "Pipeline started with output monitor.");
    Ok(pipeline)
  }
}
