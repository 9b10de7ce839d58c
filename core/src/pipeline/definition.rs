// piper/src/pipeline/definition.rs

//! Contains the `Pipeline<In, Out>` handle and its accessors.

use crate::channel::{PipelineInput, PipelineOutput, SharedReceiver};
use crate::config::PipelineConfig;
use crate::error::{PiperError, PiperResult};
use crate::pipeline::builder::PipelineBuilder;
use crate::worker::{StageState, WorkerPool};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running pipeline taking `In` items and producing `Out` items.
///
/// Every worker is already running when a `Pipeline` is handed out. Items are
/// fed through [`input`](Self::input) and collected from [`output`](Self::output);
/// [`close`](Self::close) stops everything. Dropping an unclosed pipeline
/// cancels its workers without waiting for them.
///
/// With more than one worker on a stage, items leave that stage in no
/// particular order. Single-worker stages preserve order end to end.
pub struct Pipeline<In, Out> {
  pub(crate) name: String,
  /// The pipeline's own input sender; taken by `close` and `close_input`.
  pub(crate) input: Mutex<Option<mpsc::Sender<In>>>,
  pub(crate) output: SharedReceiver<Out>,
  pub(crate) stages: RwLock<Vec<Arc<StageState>>>,
  pub(crate) handles: Mutex<Vec<JoinHandle<()>>>,
  pub(crate) cancel: CancellationToken,
  pub(crate) closed: AtomicBool,
}

/// A snapshot of one stage of a running pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
  pub index: usize,
  pub name: String,
  /// Workers started for this stage, after clamping.
  pub workers: usize,
  /// Workers that have not exited yet.
  pub active_workers: usize,
  /// Whether the stage's output channel has been closed.
  pub closed: bool,
}

impl<In> Pipeline<In, In>
where
  In: Send + 'static,
{
  /// Starts a statically typed pipeline. Each `.stage(..)` call fixes the
  /// next value type, so mismatched neighbours do not compile.
  pub fn builder() -> PipelineBuilder<In, In> {
    PipelineBuilder::new()
  }
}

impl<In, Out> Pipeline<In, Out> {
  pub(crate) fn from_parts(
    config: &PipelineConfig,
    input: mpsc::Sender<In>,
    output: SharedReceiver<Out>,
    pool: WorkerPool,
    cancel: CancellationToken,
  ) -> Self {
    let (stages, handles) = pool.into_parts();
    Self {
      name: config.name().to_string(),
      input: Mutex::new(Some(input)),
      output,
      stages: RwLock::new(stages),
      handles: Mutex::new(handles),
      cancel,
      closed: AtomicBool::new(false),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The endpoint producers write to.
  ///
  /// After [`close`](Self::close) or [`close_input`](Self::close_input) the
  /// returned endpoint rejects every item with [`PiperError::AlreadyClosed`].
  pub fn input(&self) -> PipelineInput<In> {
    PipelineInput::new(self.input.lock().clone())
  }

  /// The endpoint consumers read from. Its identity never changes for the
  /// lifetime of the pipeline.
  pub fn output(&self) -> PipelineOutput<Out> {
    PipelineOutput::new(self.output.clone())
  }

  /// Sends one item into the pipeline, waiting for the first stage to accept it.
  pub async fn send(&self, item: In) -> PiperResult<()> {
    if self.is_closed() {
      return Err(PiperError::AlreadyClosed);
    }
    self.input().send(item).await
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  /// Number of stages. Zero once the pipeline has been closed and its stage list released.
  pub fn stage_count(&self) -> usize {
    self.stages.read().len()
  }

  pub fn stage(&self, index: usize) -> PiperResult<StageInfo> {
    let stages = self.stages.read();
    let state = stages.get(index).ok_or(PiperError::OutOfRange {
      index,
      len: stages.len(),
    })?;
    Ok(StageInfo {
      index: state.index(),
      name: state.name().to_string(),
      workers: state.workers(),
      active_workers: state.live_workers(),
      closed: state.is_closed(),
    })
  }

  /// Total workers started across all stages.
  pub fn worker_count(&self) -> usize {
    self.stages.read().iter().map(|s| s.workers()).sum()
  }

  /// Workers across all stages that are still running.
  pub fn active_workers(&self) -> usize {
    self.stages.read().iter().map(|s| s.live_workers()).sum()
  }
}

impl<In, Out> std::fmt::Debug for Pipeline<In, Out> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Pipeline")
      .field("name", &self.name)
      .field("stages", &self.stage_count())
      .field("closed", &self.is_closed())
      .finish()
  }
}
