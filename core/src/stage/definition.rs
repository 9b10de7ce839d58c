// piper/src/stage/definition.rs

//! `Stage<I, O>`, the statically typed unit of work, and `DynStage`, its
//! runtime-typed form for pipelines assembled from data.

use crate::stage::validate::clamp_workers;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tracing::{event, Level};

/// A value whose concrete type is only known at runtime.
pub type AnyValue = Box<dyn Any + Send>;

/// The mapping a stage applies to every item. `None` drops the item.
pub(crate) type Transform<I, O> = Arc<dyn Fn(I) -> Option<O> + Send + Sync + 'static>;

/// One step of a pipeline: a transform plus the number of workers that run it.
///
/// Worker counts are clamped when assigned: 0 becomes 1 and anything above
/// [`MAX_WORKERS`](crate::MAX_WORKERS) becomes the maximum.
pub struct Stage<I, O> {
  pub(crate) name: Option<String>,
  pub(crate) workers: usize,
  pub(crate) transform: Transform<I, O>,
}

impl<I, O> Stage<I, O>
where
  I: Send + 'static,
  O: Send + 'static,
{
  /// A stage forwarding `f(item)` for every item it receives.
  pub fn new<F>(workers: usize, f: F) -> Self
  where
    F: Fn(I) -> O + Send + Sync + 'static,
  {
    Self::from_transform(workers, Arc::new(move |item: I| Some(f(item))))
  }

  /// A stage that may drop items by returning `None`.
  pub fn filter_map<F>(workers: usize, f: F) -> Self
  where
    F: Fn(I) -> Option<O> + Send + Sync + 'static,
  {
    Self::from_transform(workers, Arc::new(f))
  }

  /// A stage whose transform can fail. Failed items are logged and discarded;
  /// nothing is retried and the pipeline keeps running.
  pub fn fallible<F, E>(workers: usize, f: F) -> Self
  where
    F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    E: Into<anyhow::Error>,
  {
    Self::from_transform(
      workers,
      Arc::new(move |item: I| match f(item) {
        Ok(out) => Some(out),
        Err(e) => {
          let err: anyhow::Error = e.into();
          event!(Level::WARN, error = %err, "Transform failed, item discarded.");
          None
        }
      }),
    )
  }

  pub(crate) fn from_transform(workers: usize, transform: Transform<I, O>) -> Self {
    Self {
      name: None,
      workers: clamp_workers(workers, crate::config::MAX_WORKERS),
      transform,
    }
  }

  /// Names the stage in tracing output and in [`StageInfo`](crate::StageInfo).
  pub fn named<S: Into<String>>(mut self, name: S) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn workers(&self) -> usize {
    self.workers
  }

  pub fn set_workers(&mut self, workers: usize) {
    self.workers = clamp_workers(workers, crate::config::MAX_WORKERS);
  }
}

impl<I, O> Clone for Stage<I, O> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      workers: self.workers,
      transform: Arc::clone(&self.transform),
    }
  }
}

impl<I, O> std::fmt::Debug for Stage<I, O> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Stage")
      .field("name", &self.name)
      .field("workers", &self.workers)
      .field("input", &std::any::type_name::<I>())
      .field("output", &std::any::type_name::<O>())
      .finish()
  }
}

/// Identity of a value type, compared by `TypeId` and reported by name.
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
  id: TypeId,
  name: &'static str,
}

impl TypeTag {
  pub fn of<T: 'static>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeTag {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeTag {}

/// A stage whose input and output types are checked when the pipeline is
/// built rather than by the compiler.
///
/// Built from any [`Stage`] via `From`. Values travel between dynamic stages
/// as [`AnyValue`]; an item that does not downcast to the declared input type
/// is discarded.
pub struct DynStage {
  pub(crate) name: Option<String>,
  pub(crate) workers: usize,
  pub(crate) input: TypeTag,
  pub(crate) output: TypeTag,
  pub(crate) transform: Transform<AnyValue, AnyValue>,
}

impl DynStage {
  pub fn input_type(&self) -> TypeTag {
    self.input
  }

  pub fn output_type(&self) -> TypeTag {
    self.output
  }

  pub fn workers(&self) -> usize {
    self.workers
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Display label used in errors: the stage's name, or its position.
  pub(crate) fn label(&self, index: usize) -> String {
    self
      .name
      .clone()
      .unwrap_or_else(|| format!("stage-{index}"))
  }

  /// Rebinds this stage as one that takes a concrete `In`, for the first
  /// stage of a dynamic pipeline whose input channel is typed.
  pub(crate) fn with_typed_input<In: Send + 'static>(self) -> Stage<In, AnyValue> {
    let transform = self.transform;
    Stage {
      name: self.name,
      workers: self.workers,
      transform: Arc::new(move |item: In| transform(Box::new(item))),
    }
  }

  pub(crate) fn into_stage(self) -> Stage<AnyValue, AnyValue> {
    Stage {
      name: self.name,
      workers: self.workers,
      transform: self.transform,
    }
  }
}

impl<I, O> From<Stage<I, O>> for DynStage
where
  I: Send + 'static,
  O: Send + 'static,
{
  fn from(stage: Stage<I, O>) -> Self {
    let inner = stage.transform;
    let transform: Transform<AnyValue, AnyValue> = Arc::new(move |value: AnyValue| match value.downcast::<I>() {
      Ok(item) => inner(*item).map(|out| Box::new(out) as AnyValue),
      Err(_) => {
        event!(
          Level::WARN,
          expected_type = std::any::type_name::<I>(),
          "Value of unexpected type discarded."
        );
        None
      }
    });

    DynStage {
      name: stage.name,
      workers: stage.workers,
      input: TypeTag::of::<I>(),
      output: TypeTag::of::<O>(),
      transform,
    }
  }
}

impl std::fmt::Debug for DynStage {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DynStage")
      .field("name", &self.name)
      .field("workers", &self.workers)
      .field("input", &self.input.name)
      .field("output", &self.output.name)
      .finish()
  }
}
