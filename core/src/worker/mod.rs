// piper/src/worker/mod.rs

//! Worker pools, per-stage shutdown state and the output monitor.

pub(crate) mod monitor;
pub(crate) mod pool;
pub(crate) mod state;

pub(crate) use pool::WorkerPool;
pub(crate) use state::StageState;
