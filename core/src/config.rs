// piper/src/config.rs

//! Pipeline-wide tunables.

/// Upper bound on the workers a single stage may run.
///
/// Requests above this are clamped silently; it is a policy, not a validation failure.
pub const MAX_WORKERS: usize = 1000;

/// Capacity of every hand-off channel between stages.
///
/// Tokio's bounded channels need at least one slot, so this is the closest
/// thing to an unbuffered rendezvous.
pub const HANDOFF_CAPACITY: usize = 1;

/// Construction-time settings for a pipeline. Nothing here can change after build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  name: String,
  max_workers: usize,
}

impl PipelineConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Name carried by every tracing span of this pipeline.
  pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
    self.name = name.into();
    self
  }

  /// Lowers the per-stage worker cap. Values are clamped into `1..=MAX_WORKERS`.
  pub fn with_max_workers(mut self, max_workers: usize) -> Self {
    self.max_workers = max_workers.clamp(1, MAX_WORKERS);
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn max_workers(&self) -> usize {
    self.max_workers
  }
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      name: "pipeline".to_string(),
      max_workers: MAX_WORKERS,
    }
  }
}
