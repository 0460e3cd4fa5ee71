//! What the monitor hands back to the caller of an execution.

use super::Value;
use crate::error::TransformError;

/// One `(value, error, is_final)` triple delivered to an execution callback.
///
/// Data deliveries carry a value; exactly one final delivery carries either
/// nothing (clean end of stream) or the error that ended the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  pub value: Option<Value>,
  pub error: Option<TransformError>,
  pub is_final: bool,
}

impl Delivery {
  pub fn data(value: Value) -> Self {
    Self {
      value: Some(value),
      error: None,
      is_final: false,
    }
  }

  pub fn end() -> Self {
    Self {
      value: None,
      error: None,
      is_final: true,
    }
  }

  pub fn failed(error: TransformError) -> Self {
    Self {
      value: None,
      error: Some(error),
      is_final: true,
    }
  }
}
