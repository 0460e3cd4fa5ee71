//! Transform registry: type name to factory, built once at startup.

use crate::error::{ErrorKind, Result, TransformError};
use crate::node::Node;
use crate::transform::Transform;
use crate::transforms::{Base64Decode, Base64Encode, Collect, PassThrough};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> Box<dyn Transform> + Send + Sync>;

/// Creates nodes by transform type name (used by internalization).
#[derive(Clone, Default)]
pub struct TransformRegistry {
  factories: HashMap<String, Factory>,
}

impl fmt::Debug for TransformRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TransformRegistry")
      .field("types", &self.type_names())
      .finish()
  }
}

impl TransformRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with the built-in transforms.
  pub fn with_builtins() -> Self {
    let mut r = Self::new();
    r.register(PassThrough::TYPE, PassThrough::new);
    r.register(Collect::TYPE, Collect::new);
    r.register(Base64Encode::TYPE, Base64Encode::new);
    r.register(Base64Decode::TYPE, Base64Decode::new);
    r
  }

  /// Registers (or replaces) the factory for `type_name`.
  pub fn register<F, T>(&mut self, type_name: impl Into<String>, factory: F)
  where
    F: Fn() -> T + Send + Sync + 'static,
    T: Transform,
  {
    self.factories.insert(
      type_name.into(),
      Arc::new(move || Box::new(factory()) as Box<dyn Transform>),
    );
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.factories.contains_key(type_name)
  }

  /// Registered type names, sorted.
  pub fn type_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.factories.keys().cloned().collect();
    names.sort();
    names
  }

  /// Builds a fresh node of `type_name`.
  pub fn create(&self, type_name: &str) -> Result<Node> {
    let factory = self.factories.get(type_name).ok_or_else(|| {
      TransformError::new(
        ErrorKind::UnknownType,
        format!("no transform registered as '{}'", type_name),
      )
    })?;
    Ok(Node::from_boxed(factory()))
  }
}
