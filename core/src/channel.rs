// piper/src/channel.rs

//! Hand-off channels between stages and the endpoints handed to callers.
//!
//! Every link in a pipeline is a bounded Tokio mpsc channel of
//! [`HANDOFF_CAPACITY`]. Tokio receivers are single-consumer, so the workers of
//! a stage share one receiver behind an async mutex; whichever worker holds the
//! lock when an item arrives takes it.

use crate::config::HANDOFF_CAPACITY;
use crate::error::{PiperError, PiperResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Creates one hand-off link.
pub(crate) fn handoff<T>() -> (mpsc::Sender<T>, SharedReceiver<T>) {
  let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
  (tx, SharedReceiver::new(rx))
}

/// A receiver that any number of tasks may pull from.
pub(crate) struct SharedReceiver<T>(Arc<Mutex<mpsc::Receiver<T>>>);

impl<T> SharedReceiver<T> {
  fn new(rx: mpsc::Receiver<T>) -> Self {
    SharedReceiver(Arc::new(Mutex::new(rx)))
  }

  /// Waits for the next item. `None` once every sender is gone and the buffer is empty.
  ///
  /// Cancel-safe: dropping the future either releases the lock or leaves the
  /// item in the channel.
  pub(crate) async fn recv(&self) -> Option<T> {
    self.0.lock().await.recv().await
  }
}

impl<T> Clone for SharedReceiver<T> {
  fn clone(&self) -> Self {
    SharedReceiver(Arc::clone(&self.0))
  }
}

/// The send endpoint of a pipeline.
///
/// Clones share the same channel. The channel stays open for as long as any
/// clone (or the pipeline itself) holds a sender, so drop your clones after
/// [`Pipeline::close_input`](crate::Pipeline::close_input) to let the stages drain.
pub struct PipelineInput<T> {
  tx: Option<mpsc::Sender<T>>,
}

impl<T> PipelineInput<T> {
  pub(crate) fn new(tx: Option<mpsc::Sender<T>>) -> Self {
    Self { tx }
  }

  /// Hands one item to the first stage, waiting while no worker is ready for it.
  ///
  /// Fails with [`PiperError::AlreadyClosed`] once the pipeline has been closed
  /// or its input sealed; the item is dropped.
  pub async fn send(&self, item: T) -> PiperResult<()> {
    match &self.tx {
      Some(tx) => tx.send(item).await.map_err(|_| PiperError::AlreadyClosed),
      None => Err(PiperError::AlreadyClosed),
    }
  }

  /// True when no stage will ever receive from this endpoint again.
  pub fn is_closed(&self) -> bool {
    self.tx.as_ref().map_or(true, |tx| tx.is_closed())
  }
}

impl<T> Clone for PipelineInput<T> {
  fn clone(&self) -> Self {
    Self { tx: self.tx.clone() }
  }
}

impl<T> std::fmt::Debug for PipelineInput<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineInput")
      .field("closed", &self.is_closed())
      .finish()
  }
}

/// The receive endpoint of a pipeline. Clones compete for items.
pub struct PipelineOutput<T> {
  rx: SharedReceiver<T>,
}

impl<T> PipelineOutput<T> {
  pub(crate) fn new(rx: SharedReceiver<T>) -> Self {
    Self { rx }
  }

  /// Next transformed item, or `None` once the pipeline output is closed and drained.
  pub async fn recv(&self) -> Option<T> {
    self.rx.recv().await
  }
}

impl<T> Clone for PipelineOutput<T> {
  fn clone(&self) -> Self {
    Self { rx: self.rx.clone() }
  }
}

impl<T> std::fmt::Debug for PipelineOutput<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PipelineOutput").finish_non_exhaustive()
  }
}
