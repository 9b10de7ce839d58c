// piper/src/lib.rs

//! Piper: a multi-stage concurrent processing pipeline.
//!
//! A pipeline is an ordered list of stages. Each stage applies one transform
//! and is run by its own pool of Tokio tasks; consecutive stages are joined by
//! hand-off channels. Callers push items into the pipeline's input and read
//! transformed items from its output, while the pipeline owns the wiring,
//! the worker lifecycle and shutdown.
//!
//!  - Stages with a configurable worker count (clamped to `1..=MAX_WORKERS`).
//!  - Transforms that map, filter (`None` drops the item) or fail (logged and dropped).
//!  - Compile-time checked stage chains via [`Pipeline::builder`].
//!  - Runtime-assembled chains via [`Pipeline::from_stages`], type-checked at construction.
//!  - Idempotent, awaited shutdown via [`Pipeline::close`], and drain-style
//!    completion via [`Pipeline::close_input`].
//!
//! Ordering is only preserved through stages that run a single worker.

pub mod channel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod stage;
pub(crate) mod worker;

// --- Re-exports for the Public API ---

pub use crate::channel::{PipelineInput, PipelineOutput};
pub use crate::config::{PipelineConfig, HANDOFF_CAPACITY, MAX_WORKERS};
pub use crate::error::{PiperError, PiperResult};
pub use crate::pipeline::{Pipeline, PipelineBuilder, StageInfo};
pub use crate::stage::{AnyValue, DynStage, Stage, TypeTag};

/*
    Typical use:
    1. Describe each step as a `Stage<I, O>` with a worker count and a transform.
    2. Chain them with `Pipeline::builder().stage(..).stage(..).build()` from
       inside a Tokio runtime; every worker is running when `build` returns.
    3. Feed items through `pipeline.input()` and read them from `pipeline.output()`.
    4. Either `close_input()` and read the output until `None`, or `close().await`
       to stop at once.
*/
