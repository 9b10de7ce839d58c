// piper/src/pipeline/shutdown.rs

//! Coordinated shutdown of a running pipeline.

use crate::error::{PiperError, PiperResult};
use crate::pipeline::definition::Pipeline;
use std::sync::atomic::Ordering;
use tracing::{event, instrument, Level};

impl<In, Out> Pipeline<In, Out> {
  /// Stops every worker of every stage and waits until they have exited.
  ///
  /// Only the first call does anything; every later (or concurrent) call
  /// returns [`PiperError::AlreadyClosed`]. Items still in flight when the
  /// termination signal lands may be dropped. Once this returns, the output
  /// yields whatever was already buffered and then `None`.
  #[instrument(name = "Pipeline::close", skip_all, fields(pipeline = %self.name))]
  pub async fn close(&self) -> PiperResult<()> {
    if self
      .closed
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      event!(Level::DEBUG, "Pipeline already closed.");
      return Err(PiperError::AlreadyClosed);
    }

    self.input.lock().take();
    // Every stage token is a child of this one.
    self.cancel.cancel();

    let handles = std::mem::take(&mut *self.handles.lock());
    let tasks = handles.len();
    for handle in handles {
      if let Err(e) = handle.await {
        if e.is_panic() {
          event!(Level::WARN, error = %e, "Pipeline task panicked before shutdown.");
        }
      }
    }

    self.stages.write().clear();
    event!(Level::DEBUG, tasks, "Pipeline closed.");
    Ok(())
  }

  /// Seals the input without stopping the workers.
  ///
  /// Once every [`PipelineInput`](crate::PipelineInput) clone has also been
  /// dropped, each stage drains what it has, closes its output and exits, so
  /// the pipeline output ends after the last item. Returns `false` if the
  /// input was already sealed. [`close`](Self::close) is still needed to mark
  /// the pipeline closed.
  pub fn close_input(&self) -> bool {
    let sealed = self.input.lock().take().is_some();
    if sealed {
      event!(Level::DEBUG, pipeline = %self.name, "Pipeline input sealed.");
    }
    sealed
  }
}

impl<In, Out> Drop for Pipeline<In, Out> {
  fn drop(&mut self) {
    if !*self.closed.get_mut() {
      event!(Level::DEBUG, pipeline = %self.name, "Pipeline dropped without close, cancelling workers.");
      self.cancel.cancel();
    }
  }
}
