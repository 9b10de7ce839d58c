// piper/src/stage/mod.rs

//! Stage descriptors and the checks run on them before a pipeline starts.

pub mod definition;
pub(crate) mod validate;

pub use definition::{AnyValue, DynStage, Stage, TypeTag};
