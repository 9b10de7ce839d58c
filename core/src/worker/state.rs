// piper/src/worker/state.rs

//! Per-stage shutdown bookkeeping shared by the workers of one stage.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{event, Level};

/// Runtime state of one stage: identity, live worker count and the closed flag.
#[derive(Debug)]
pub(crate) struct StageState {
  index: usize,
  name: String,
  workers: usize,
  closed: AtomicBool,
  live: AtomicUsize,
}

impl StageState {
  pub(crate) fn new(index: usize, name: String, workers: usize) -> Self {
    Self {
      index,
      name,
      workers,
      closed: AtomicBool::new(false),
      live: AtomicUsize::new(0),
    }
  }

  pub(crate) fn index(&self) -> usize {
    self.index
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn workers(&self) -> usize {
    self.workers
  }

  pub(crate) fn live_workers(&self) -> usize {
    self.live.load(Ordering::Acquire)
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  /// Flips `closed`. Only the first caller gets `true`.
  fn mark_closed(&self) -> bool {
    self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  fn worker_started(&self) {
    self.live.fetch_add(1, Ordering::AcqRel);
  }

  /// Returns the number of workers still running after this one.
  fn worker_stopped(&self) -> usize {
    self.live.fetch_sub(1, Ordering::AcqRel).saturating_sub(1)
  }
}

/// The output side of a stage. Workers borrow a sender per item; closing
/// takes the stored sender away so the channel shuts once in-flight sends finish.
pub(crate) struct StageOutput<O> {
  state: Arc<StageState>,
  tx: Mutex<Option<mpsc::Sender<O>>>,
}

impl<O> StageOutput<O> {
  pub(crate) fn new(state: Arc<StageState>, tx: mpsc::Sender<O>) -> Self {
    Self {
      state,
      tx: Mutex::new(Some(tx)),
    }
  }

  /// A sender for one item, or `None` once the stage output is closed.
  pub(crate) fn sender(&self) -> Option<mpsc::Sender<O>> {
    self.tx.lock().clone()
  }

  /// Closes the stage output. Idempotent; returns whether this call closed it.
  pub(crate) fn close(&self) -> bool {
    if !self.state.mark_closed() {
      return false;
    }
    self.tx.lock().take();
    event!(
      Level::DEBUG,
      stage = %self.state.name(),
      stage_index = self.state.index(),
      "Stage output closed."
    );
    true
  }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
  /// The stage's termination signal fired.
  Terminated,
  /// Every upstream sender is gone and the upstream buffer is empty.
  UpstreamClosed,
  /// Nobody will ever receive from this stage's output again.
  DownstreamGone,
  /// Another worker of this stage already closed the output.
  OutputClosed,
  /// The transform panicked.
  Panicked,
  /// The task was dropped mid-loop, e.g. by runtime shutdown.
  Aborted,
}

/// Runs a worker's exit bookkeeping when dropped, even if the task never ran.
///
/// Termination closes the stage output on the first exit. Exhaustion of the
/// upstream, a panic or an abort closes it on the last exit so the surviving
/// workers keep delivering.
pub(crate) struct WorkerGuard<O> {
  output: Arc<StageOutput<O>>,
  exit: WorkerExit,
}

impl<O> WorkerGuard<O> {
  /// Counts the worker as live until the guard is dropped.
  pub(crate) fn new(output: Arc<StageOutput<O>>) -> Self {
    output.state.worker_started();
    Self {
      output,
      exit: WorkerExit::Aborted,
    }
  }

  pub(crate) fn finish(mut self, exit: WorkerExit) {
    self.exit = exit;
  }
}

impl<O> Drop for WorkerGuard<O> {
  fn drop(&mut self) {
    let exit = self.exit;
    let remaining = self.output.state.worker_stopped();
    let close = match exit {
      WorkerExit::UpstreamClosed | WorkerExit::Panicked | WorkerExit::Aborted => remaining == 0,
      WorkerExit::OutputClosed => false,
      WorkerExit::Terminated | WorkerExit::DownstreamGone => true,
    };

    if exit == WorkerExit::Panicked {
      event!(Level::WARN, remaining, "Worker panicked while applying its transform.");
    } else {
      event!(Level::DEBUG, exit = ?exit, remaining, "Worker exited.");
    }

    if close {
      self.output.close();
    }
  }
}
