// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use piper::{PipelineOutput, Stage};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

/// Upper bound on any single wait in these tests; a hang fails the test instead of stalling the run.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Counting transforms ---
pub static TRANSFORM_CALLS: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  TRANSFORM_CALLS.store(0, Ordering::SeqCst);
}

pub fn transform_calls() -> usize {
  TRANSFORM_CALLS.load(Ordering::SeqCst)
}

/// `x -> x + 1`, counting every invocation in `TRANSFORM_CALLS`.
pub fn counting_increment_stage(workers: usize) -> Stage<i32, i32> {
  Stage::new(workers, |x: i32| {
    TRANSFORM_CALLS.fetch_add(1, Ordering::SeqCst);
    x + 1
  })
}

pub fn square_stage(workers: usize) -> Stage<i32, i32> {
  Stage::new(workers, |x: i32| x * x).named("square")
}

pub fn to_string_stage(workers: usize) -> Stage<i32, String> {
  Stage::new(workers, |x: i32| x.to_string()).named("to_string")
}

// --- Receiving with a deadline ---

/// Next output item; panics if nothing (not even end-of-stream) arrives in time.
pub async fn recv_within<T>(output: &PipelineOutput<T>) -> Option<T> {
  tokio::time::timeout(RECV_TIMEOUT, output.recv())
    .await
    .expect("timed out waiting for pipeline output")
}

/// Reads until end-of-stream.
pub async fn collect_until_closed<T>(output: &PipelineOutput<T>) -> Vec<T> {
  let mut items = Vec::new();
  while let Some(item) = recv_within(output).await {
    items.push(item);
  }
  items
}

/// Number of tasks alive on the current runtime.
pub fn alive_tasks() -> usize {
  tokio::runtime::Handle::current().metrics().num_alive_tasks()
}
