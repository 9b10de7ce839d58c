// piper/src/pipeline/builder.rs

//! The statically typed pipeline builder.

use crate::channel::{handoff, SharedReceiver};
use crate::config::PipelineConfig;
use crate::error::{PiperError, PiperResult};
use crate::pipeline::definition::Pipeline;
use crate::stage::definition::Stage;
use crate::worker::WorkerPool;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

/// Deferred wiring of the stages added so far: given the pipeline input,
/// spawn every stage and return the last stage's output.
type Wiring<In, Cur> = Box<dyn FnOnce(&mut WorkerPool, SharedReceiver<In>) -> SharedReceiver<Cur> + Send>;

/// Builds a [`Pipeline`] whose input is `In` and whose last stage so far yields `Cur`.
///
/// Nothing runs until [`build`](Self::build).
pub struct PipelineBuilder<In, Cur> {
  config: PipelineConfig,
  stage_count: usize,
  wiring: Wiring<In, Cur>,
}

impl<In> PipelineBuilder<In, In>
where
  In: Send + 'static,
{
  pub fn new() -> Self {
    Self {
      config: PipelineConfig::default(),
      stage_count: 0,
      wiring: Box::new(|_pool: &mut WorkerPool, input: SharedReceiver<In>| input),
    }
  }
}

impl<In> Default for PipelineBuilder<In, In>
where
  In: Send + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<In, Cur> PipelineBuilder<In, Cur>
where
  In: Send + 'static,
  Cur: Send + 'static,
{
  pub fn config(mut self, config: PipelineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn name<S: Into<String>>(mut self, name: S) -> Self {
    self.config = self.config.with_name(name);
    self
  }

  /// Lowers the per-stage worker cap for this pipeline.
  pub fn max_workers(mut self, max_workers: usize) -> Self {
    self.config = self.config.with_max_workers(max_workers);
    self
  }

  /// Appends a stage consuming what the previous stage produces.
  pub fn stage<Next>(self, stage: Stage<Cur, Next>) -> PipelineBuilder<In, Next>
  where
    Next: Send + 'static,
  {
    let upstream_wiring = self.wiring;
    PipelineBuilder {
      config: self.config,
      stage_count: self.stage_count + 1,
      wiring: Box::new(move |pool: &mut WorkerPool, input: SharedReceiver<In>| {
        let upstream = upstream_wiring(pool, input);
        pool.spawn_stage(stage, upstream)
      }),
    }
  }

  /// Creates the channels and starts every worker.
  ///
  /// Must be called from within a Tokio runtime. Fails without starting
  /// anything if no stage was added or no runtime is available.
  #[instrument(
    name = "PipelineBuilder::build",
    skip_all,
    fields(pipeline = %self.config.name(), num_stages = self.stage_count),
    err(Display)
  )]
  pub fn build(self) -> PiperResult<Pipeline<In, Cur>> {
    if self.stage_count == 0 {
      return Err(PiperError::NoStages);
    }
    let runtime = Handle::try_current().map_err(|_| PiperError::RuntimeUnavailable)?;

    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::new(runtime, &self.config, cancel.clone());
    let (input_tx, input_rx) = handoff::<In>();
    let output = (self.wiring)(&mut pool, input_rx);

    let pipeline = Pipeline::from_parts(&self.config, input_tx, output, pool, cancel);
    event!(Level::DEBUG, workers = pipeline.worker_count(), "Pipeline started.");
    Ok(pipeline)
  }
}

impl<In, Cur> std::fmt::Debug for PipelineBuilder<In, Cur> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineBuilder")
      .field("config", &self.config)
      .field("stage_count", &self.stage_count)
      .finish_non_exhaustive()
  }
}
