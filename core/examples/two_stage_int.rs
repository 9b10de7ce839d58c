// piper/examples/two_stage_int.rs

use piper::{Pipeline, PiperError, Stage};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), PiperError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Two Stage Int Example ---");

  // 1. Square every item on four workers, then render it on one.
  let pipeline = Pipeline::builder()
    .name("two-stage-int")
    .stage(Stage::new(4, |x: i64| x * x).named("square"))
    .stage(Stage::new(1, |x: i64| format!("squared: {x}")).named("render"))
    .build()?;

  for index in 0..pipeline.stage_count() {
    let info = pipeline.stage(index)?;
    info!("Stage {} '{}' runs {} worker(s)", info.index, info.name, info.workers);
  }

  // 2. Feed from a separate task; dropping its handle is what lets the drain finish.
  let input = pipeline.input();
  tokio::spawn(async move {
    for x in 1..=10 {
      if let Err(e) = input.send(x).await {
        info!("Producer stopped: {}", e);
        break;
      }
    }
  });
  pipeline.close_input();

  // 3. Read until every stage has drained.
  let output = pipeline.output();
  let mut received = 0;
  while let Some(line) = output.recv().await {
    info!("{}", line);
    received += 1;
  }
  info!("Received {} items", received);

  pipeline.close().await?;
  info!("Pipeline closed: {}", pipeline.is_closed());
  Ok(())
}
