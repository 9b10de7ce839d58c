// piper/src/pipeline/mod.rs

//! Defines the `Pipeline<In, Out>` handle, its builders and its shutdown protocol.

pub mod builder;
pub mod definition;
pub mod dynamic;
pub mod shutdown;

// Re-export the main Pipeline struct
pub use builder::PipelineBuilder;
pub use definition::{Pipeline, StageInfo};
