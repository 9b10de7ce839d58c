// piper/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PiperError {
  /// The pipeline was given an empty stage list.
  #[error("Pipeline has no stages")]
  NoStages,

  /// A declared value type does not line up with its neighbour.
  /// `stage` names the consumer side of the mismatch (a stage name, or "pipeline output").
  #[error("Type mismatch at '{stage}': expected {expected_type}, found {found_type}")]
  TypeMismatch {
    stage: String,
    expected_type: String,
    found_type: String,
  },

  #[error("Stage index {index} is out of range (pipeline has {len} stages)")]
  OutOfRange { index: usize, len: usize },

  #[error("Pipeline is already closed")]
  AlreadyClosed,

  /// Construction was attempted outside of a Tokio runtime.
  #[error("No Tokio runtime is available to run pipeline workers")]
  RuntimeUnavailable,

  #[error("Internal piper error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for PiperError {
  fn from(err: AnyhowError) -> Self {
    // Unwrap a PiperError that travelled through anyhow instead of nesting it.
    match err.downcast::<PiperError>() {
      Ok(piper_err) => piper_err,
      Err(other) => PiperError::Internal(format!("{other:#}")),
    }
  }
}

pub type PiperResult<T, E = PiperError> = std::result::Result<T, E>;
