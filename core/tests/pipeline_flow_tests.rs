// tests/pipeline_flow_tests.rs
mod common;

use common::*;
use piper::{Pipeline, Stage};
use serial_test::serial;

#[tokio::test]
async fn test_increment_stage_transforms_item() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::new(1, |x: i32| x + 1))
    .build()
    .unwrap();

  pipeline.send(1).await.unwrap();
  assert_eq!(recv_within(&pipeline.output()).await, Some(2));

  pipeline.close().await.unwrap();
}

#[tokio::test]
async fn test_single_worker_stages_preserve_order_end_to_end() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(square_stage(1))
    .stage(to_string_stage(1))
    .build()
    .unwrap();

  let input = pipeline.input();
  let output = pipeline.output();

  input.send(2).await.unwrap();
  input.send(3).await.unwrap();

  assert_eq!(recv_within(&output).await.as_deref(), Some("4"));
  assert_eq!(recv_within(&output).await.as_deref(), Some("9"));

  pipeline.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_chain_keeps_a_long_stream_in_order() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::new(1, |x: u32| x * 3))
    .stage(Stage::filter_map(1, |x: u32| Some(x + 1)))
    .stage(Stage::new(1, |x: u32| x.to_string()))
    .build()
    .unwrap();

  let input = pipeline.input();
  tokio::spawn(async move {
    for i in 0..200u32 {
      input.send(i).await.unwrap();
    }
  });
  pipeline.close_input();

  let results = collect_until_closed(&pipeline.output()).await;
  let expected: Vec<String> = (0..200u32).map(|i| (i * 3 + 1).to_string()).collect();
  assert_eq!(results, expected);

  pipeline.close().await.unwrap();
}

#[tokio::test]
async fn test_filter_map_drops_items_silently() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::filter_map(1, |x: i32| if x % 2 == 0 { Some(x) } else { None }))
    .stage(Stage::new(1, |x: i32| x * 10))
    .build()
    .unwrap();

  let input = pipeline.input();
  tokio::spawn(async move {
    for i in 1..=6 {
      input.send(i).await.unwrap();
    }
  });
  // The producer's own clone keeps the input open until it is done.
  assert!(pipeline.close_input());

  let results = collect_until_closed(&pipeline.output()).await;
  assert_eq!(results, vec![20, 40, 60]);

  pipeline.close().await.unwrap();
}

#[tokio::test]
async fn test_fallible_stage_discards_failures_and_keeps_running() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::fallible(1, |s: String| s.parse::<i32>()))
    .build()
    .unwrap();

  let input = pipeline.input();
  tokio::spawn(async move {
    for raw in ["1", "not a number", "3"] {
      input.send(raw.to_string()).await.unwrap();
    }
  });

  let output = pipeline.output();
  assert_eq!(recv_within(&output).await, Some(1));
  assert_eq!(recv_within(&output).await, Some(3));

  pipeline.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_item_reaches_output_with_many_workers() {
  setup_tracing();
  const WORKERS: usize = 8;
  let pipeline = Pipeline::builder()
    .stage(Stage::new(WORKERS, |x: usize| x * 2))
    .build()
    .unwrap();

  for i in 0..WORKERS {
    let input = pipeline.input();
    tokio::spawn(async move { input.send(i).await.unwrap() });
  }

  let output = pipeline.output();
  let mut results = Vec::new();
  for _ in 0..WORKERS {
    results.push(recv_within(&output).await.unwrap());
  }
  results.sort_unstable();

  let expected: Vec<usize> = (0..WORKERS).map(|i| i * 2).collect();
  assert_eq!(results, expected);

  pipeline.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_input_drains_every_stage_before_ending_output() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::new(4, |x: u64| x + 1))
    .stage(Stage::filter_map(3, |x: u64| Some(x * 2)))
    .stage(Stage::new(2, |x: u64| x.to_string()))
    .build()
    .unwrap();

  let input = pipeline.input();
  tokio::spawn(async move {
    for i in 0..50u64 {
      input.send(i).await.unwrap();
    }
  });
  pipeline.close_input();
  assert!(!pipeline.close_input());

  let mut results: Vec<u64> = collect_until_closed(&pipeline.output())
    .await
    .into_iter()
    .map(|s| s.parse().unwrap())
    .collect();
  results.sort_unstable();

  let expected: Vec<u64> = (0..50u64).map(|i| (i + 1) * 2).collect();
  assert_eq!(results, expected);

  // Every stage closed its output on the way down.
  assert_eq!(pipeline.active_workers(), 0);
  for index in 0..pipeline.stage_count() {
    assert!(pipeline.stage(index).unwrap().closed);
  }

  pipeline.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_each_item_is_transformed_exactly_once() {
  setup_tracing();
  reset_counters();
  let pipeline = Pipeline::builder()
    .stage(counting_increment_stage(3))
    .stage(counting_increment_stage(2))
    .build()
    .unwrap();

  let input = pipeline.input();
  tokio::spawn(async move {
    for i in 0..10 {
      input.send(i).await.unwrap();
    }
  });
  pipeline.close_input();

  let results = collect_until_closed(&pipeline.output()).await;
  assert_eq!(results.len(), 10);
  assert_eq!(transform_calls(), 20);

  pipeline.close().await.unwrap();
}

#[tokio::test]
async fn test_output_clones_share_the_same_stream() {
  setup_tracing();
  let pipeline = Pipeline::builder()
    .stage(Stage::new(1, |x: i32| x))
    .build()
    .unwrap();

  let first = pipeline.output();
  let second = pipeline.output();

  pipeline.send(1).await.unwrap();
  pipeline.send(2).await.unwrap();

  assert_eq!(recv_within(&first).await, Some(1));
  assert_eq!(recv_within(&second).await, Some(2));

  pipeline.close().await.unwrap();
}
