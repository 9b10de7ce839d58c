// piper/src/worker/pool.rs

//! Spawns the worker pool of each stage and owns the worker loop.

use crate::channel::{handoff, SharedReceiver};
use crate::config::PipelineConfig;
use crate::stage::definition::{Stage, Transform};
use crate::stage::validate::clamp_workers;
use crate::worker::state::{StageOutput, StageState, WorkerExit, WorkerGuard};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{event, span, Instrument, Level};

/// Collects the tasks of a pipeline while it is being wired.
///
/// Stages are spawned in order; each call consumes the previous stage's
/// output receiver and returns the new stage's.
pub(crate) struct WorkerPool {
  runtime: Handle,
  pipeline: String,
  max_workers: usize,
  cancel: CancellationToken,
  stages: Vec<Arc<StageState>>,
  handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
  pub(crate) fn new(runtime: Handle, config: &PipelineConfig, cancel: CancellationToken) -> Self {
    Self {
      runtime,
      pipeline: config.name().to_string(),
      max_workers: config.max_workers(),
      cancel,
      stages: Vec::new(),
      handles: Vec::new(),
    }
  }

  /// Starts every worker of `stage`, all pulling from `upstream`.
  pub(crate) fn spawn_stage<I, O>(&mut self, stage: Stage<I, O>, upstream: SharedReceiver<I>) -> SharedReceiver<O>
  where
    I: Send + 'static,
    O: Send + 'static,
  {
    let index = self.stages.len();
    let workers = clamp_workers(stage.workers, self.max_workers);
    let name = stage.name.unwrap_or_else(|| format!("stage-{index}"));

    let (tx, rx) = handoff::<O>();
    let state = Arc::new(StageState::new(index, name, workers));
    let output = Arc::new(StageOutput::new(Arc::clone(&state), tx));
    // One termination signal per stage, fired when the pipeline token is cancelled.
    let stage_cancel = self.cancel.child_token();

    event!(Level::DEBUG, pipeline = %self.pipeline, stage = %state.name(), stage_index = index, workers, "Starting stage workers.");

    for worker_id in 0..workers {
      // Registered before spawning so a task dropped unpolled still checks out.
      let guard = WorkerGuard::new(Arc::clone(&output));
      let worker_span = span!(
        Level::DEBUG,
        "stage_worker",
        pipeline = %self.pipeline,
        stage = %state.name(),
        stage_index = index,
        worker_id
      );
      let worker = run_worker(
        guard,
        upstream.clone(),
        Arc::clone(&output),
        Arc::clone(&stage.transform),
        stage_cancel.clone(),
      );
      self.handles.push(self.runtime.spawn(worker.instrument(worker_span)));
    }

    self.stages.push(state);
    rx
  }

  /// Spawns a non-stage task (the output monitor) under the pipeline's token.
  pub(crate) fn spawn_task<F>(&mut self, task: F)
  where
    F: std::future::Future<Output = ()> + Send + 'static,
  {
    self.handles.push(self.runtime.spawn(task));
  }

  pub(crate) fn pipeline_name(&self) -> &str {
    &self.pipeline
  }

  pub(crate) fn cancel_token(&self) -> CancellationToken {
    self.cancel.child_token()
  }

  pub(crate) fn into_parts(self) -> (Vec<Arc<StageState>>, Vec<JoinHandle<()>>) {
    (self.stages, self.handles)
  }
}

async fn run_worker<I, O>(
  guard: WorkerGuard<O>,
  upstream: SharedReceiver<I>,
  output: Arc<StageOutput<O>>,
  transform: Transform<I, O>,
  cancel: CancellationToken,
) {
  event!(Level::TRACE, "Worker started.");
  let exit = work_loop(&upstream, &output, &transform, &cancel).await;
  guard.finish(exit);
}

/// Receive, transform, forward, until the stage is told to stop or runs dry.
async fn work_loop<I, O>(
  upstream: &SharedReceiver<I>,
  output: &StageOutput<O>,
  transform: &Transform<I, O>,
  cancel: &CancellationToken,
) -> WorkerExit {
  loop {
    let item = tokio::select! {
      biased;
      () = cancel.cancelled() => return WorkerExit::Terminated,
      item = upstream.recv() => item,
    };
    let Some(item) = item else {
      return WorkerExit::UpstreamClosed;
    };

    // A panic ends this worker only; the guard records it and siblings carry on.
    let result = match panic::catch_unwind(AssertUnwindSafe(|| transform(item))) {
      Ok(result) => result,
      Err(_) => return WorkerExit::Panicked,
    };
    let Some(result) = result else {
      event!(Level::TRACE, "Item dropped by transform.");
      continue;
    };

    let Some(tx) = output.sender() else {
      return WorkerExit::OutputClosed;
    };
    tokio::select! {
      biased;
      () = cancel.cancelled() => return WorkerExit::Terminated,
      sent = tx.send(result) => {
        if sent.is_err() {
          return WorkerExit::DownstreamGone;
        }
      }
    }
  }
}
