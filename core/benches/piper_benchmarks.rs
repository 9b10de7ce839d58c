use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use piper::{DynStage, Pipeline, Stage};
use std::sync::Arc;
use tokio::runtime::Runtime; // To run async code within Criterion

// --- Helper: one pipeline of `stages` increment stages, `workers` each ---
fn increment_chain(rt: &Runtime, stages: usize, workers: usize) -> Arc<Pipeline<u64, u64>> {
  // Pipelines spawn their workers on construction, so build inside the runtime.
  let _guard = rt.enter();
  let dyn_stages: Vec<DynStage> = (0..stages)
    .map(|_| Stage::new(workers, |x: u64| x.wrapping_add(1)).into())
    .collect();
  Arc::new(Pipeline::from_stages(dyn_stages).unwrap())
}

// --- Benchmark Functions ---

fn bench_single_item_round_trip(c: &mut Criterion) {
  let mut group = c.benchmark_group("SingleItemRoundTrip");
  let rt = Runtime::new().unwrap();

  let pipeline = {
    let _guard = rt.enter();
    Arc::new(
      Pipeline::builder()
        .stage(Stage::new(1, |x: u64| x.wrapping_mul(2)))
        .build()
        .unwrap(),
    )
  };

  group.throughput(Throughput::Elements(1));
  group.bench_function("one_stage_one_worker", |b| {
    b.to_async(&rt).iter(|| {
      let p_clone = pipeline.clone();
      async move {
        p_clone.send(21).await.unwrap();
        p_clone.output().recv().await.unwrap()
      }
    });
  });
  group.finish();
}

fn bench_batch_with_multiple_workers(c: &mut Criterion) {
  let mut group = c.benchmark_group("BatchMultipleWorkers");
  let rt = Runtime::new().unwrap();
  const BATCH: u64 = 256;

  for workers in [1usize, 4, 16].iter() {
    let pipeline = increment_chain(&rt, 3, *workers);

    group.throughput(Throughput::Elements(BATCH));
    group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, _| {
      b.to_async(&rt).iter(|| {
        let p_clone = pipeline.clone();
        async move {
          let input = p_clone.input();
          let producer = tokio::spawn(async move {
            for i in 0..BATCH {
              input.send(i).await.unwrap();
            }
          });
          let output = p_clone.output();
          for _ in 0..BATCH {
            output.recv().await.unwrap();
          }
          producer.await.unwrap();
        }
      });
    });
  }
  group.finish();
}

fn bench_thousands_of_stages(c: &mut Criterion) {
  let mut group = c.benchmark_group("ThousandsOfStages");
  group.sample_size(10);
  let rt = Runtime::new().unwrap();

  for stages in [100usize, 1000].iter() {
    let pipeline = increment_chain(&rt, *stages, 1);

    group.throughput(Throughput::Elements(*stages as u64));
    group.bench_with_input(BenchmarkId::from_parameter(stages), stages, |b, &stages| {
      b.to_async(&rt).iter(|| {
        let p_clone = pipeline.clone();
        async move {
          p_clone.send(0).await.unwrap();
          let out = p_clone.output().recv().await.unwrap();
          assert_eq!(out, stages as u64);
        }
      });
    });
  }
  group.finish();
}

fn bench_construct_and_close(c: &mut Criterion) {
  let mut group = c.benchmark_group("ConstructAndClose");
  let rt = Runtime::new().unwrap();

  for workers in [1usize, 8, 64].iter() {
    group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, &workers| {
      b.to_async(&rt).iter(|| async move {
        let pipeline = Pipeline::builder()
          .stage(Stage::new(workers, |x: u64| x))
          .stage(Stage::new(workers, |x: u64| x))
          .build()
          .unwrap();
        pipeline.close().await.unwrap();
      });
    });
  }
  group.finish();
}

criterion_group!(
  benches,
  bench_single_item_round_trip,
  bench_batch_with_multiple_workers,
  bench_thousands_of_stages,
  bench_construct_and_close
);
criterion_main!(benches);
