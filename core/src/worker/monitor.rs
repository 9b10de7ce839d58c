// piper/src/worker/monitor.rs

//! The output monitor: the single task that moves values from the last stage
//! of a runtime-typed pipeline to the pipeline's typed, stable output channel.

use crate::channel::{handoff, SharedReceiver};
use crate::stage::definition::AnyValue;
use crate::worker::pool::WorkerPool;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{event, span, Instrument, Level};

impl WorkerPool {
  /// Starts the monitor behind `last_stage` and returns the receiver callers read from.
  pub(crate) fn spawn_output_monitor<Out>(&mut self, last_stage: SharedReceiver<AnyValue>) -> SharedReceiver<Out>
  where
    Out: Send + 'static,
  {
    let (tx, rx) = handoff::<Out>();
    let monitor_span = span!(Level::DEBUG, "output_monitor", pipeline = %self.pipeline_name());
    let cancel = self.cancel_token();
    self.spawn_task(run_output_monitor(last_stage, tx, cancel).instrument(monitor_span));
    rx
  }
}

async fn run_output_monitor<Out>(last_stage: SharedReceiver<AnyValue>, tx: mpsc::Sender<Out>, cancel: CancellationToken)
where
  Out: Send + 'static,
{
  event!(Level::TRACE, "Output monitor started.");
  loop {
    let value = tokio::select! {
      biased;
      () = cancel.cancelled() => break,
      value = last_stage.recv() => value,
    };
    let Some(value) = value else {
      break;
    };

    // The chain was type-checked at build time, so this only fails on a bug.
    let item = match value.downcast::<Out>() {
      Ok(item) => *item,
      Err(_) => {
        event!(
          Level::WARN,
          expected_type = std::any::type_name::<Out>(),
          "Output value of unexpected type discarded."
        );
        continue;
      }
    };

    tokio::select! {
      biased;
      () = cancel.cancelled() => break,
      sent = tx.send(item) => {
        if sent.is_err() {
          break;
        }
      }
    }
  }
  // Dropping `tx` here closes the pipeline output.
  event!(Level::DEBUG, "Output monitor stopped.");
}
