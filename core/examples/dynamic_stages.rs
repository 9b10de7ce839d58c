// piper/examples/dynamic_stages.rs

use piper::{DynStage, Pipeline, PiperError, Stage};
use tracing::{error, info};

fn parse_and_square() -> Vec<DynStage> {
  vec![
    Stage::fallible(2, |raw: String| raw.trim().parse::<i32>())
      .named("parse")
      .into(),
    Stage::filter_map(2, |x: i32| (x >= 0).then(|| x * x))
      .named("square_non_negative")
      .into(),
    Stage::new(1, |x: i32| x.to_string()).named("stringify").into(),
  ]
}

#[tokio::main]
async fn main() -> Result<(), PiperError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Dynamic Stages Example ---");

  // Scenario 1: a chain whose types line up.
  let pipeline: Pipeline<String, String> = Pipeline::from_stages(parse_and_square())?;

  let input = pipeline.input();
  tokio::spawn(async move {
    for raw in ["3", "oops", "-4", " 5 ", "12"] {
      if input.send(raw.to_string()).await.is_err() {
        break;
      }
    }
  });
  pipeline.close_input();

  let output = pipeline.output();
  while let Some(value) = output.recv().await {
    info!("Output: {}", value);
  }
  pipeline.close().await?;

  // Scenario 2: the declared output does not match the last stage.
  match Pipeline::<String, u64>::from_stages(parse_and_square()) {
    Ok(_) => error!("Mismatched chain was accepted"),
    Err(e) => info!("Rejected as expected: {}", e),
  }

  Ok(())
}
