// piper/src/stage/validate.rs

//! Checks run on stage descriptors before any worker is started.

use crate::error::{PiperError, PiperResult};
use crate::stage::definition::{DynStage, TypeTag};

/// Applies the worker-count policy: at least one worker, at most `max`.
pub(crate) fn clamp_workers(requested: usize, max: usize) -> usize {
  requested.clamp(1, max.max(1))
}

/// Verifies that a runtime-typed stage chain connects `input` to `output`.
///
/// Every stage's declared input must equal the previous stage's declared
/// output (or the pipeline input, for the first stage), and the last stage
/// must produce the pipeline output type. A mismatch is reported from the
/// consuming side: `expected_type` is what it declares, `found_type` what feeds it.
pub(crate) fn validate_chain(input: TypeTag, stages: &[DynStage], output: TypeTag) -> PiperResult<()> {
  if stages.is_empty() {
    return Err(PiperError::NoStages);
  }

  let mut upstream = input;
  for (index, stage) in stages.iter().enumerate() {
    if stage.input_type() != upstream {
      return Err(PiperError::TypeMismatch {
        stage: stage.label(index),
        expected_type: stage.input_type().name().to_string(),
        found_type: upstream.name().to_string(),
      });
    }
    upstream = stage.output_type();
  }

  if upstream != output {
    return Err(PiperError::TypeMismatch {
      stage: "pipeline output".to_string(),
      expected_type: output.name().to_string(),
      found_type: upstream.name().to_string(),
    });
  }

  Ok(())
}
