//! Values flowing between attributes.

use crate::error::TransformError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A tagged value carried by an attribute or sent across a connection.
///
/// Queue messages are `Option<Value>`: `None` is the end-of-stream (null)
/// marker, which is distinct from an attribute that was never set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
  Data(Bytes),
  Text(String),
  Number(i64),
  Boolean(bool),
  Error(TransformError),
}

impl Value {
  /// Raw bytes of `Data` and `Text` values.
  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      Value::Data(b) => Some(b),
      Value::Text(s) => Some(s.as_bytes()),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, Value::Error(_))
  }

  pub fn as_error(&self) -> Option<&TransformError> {
    match self {
      Value::Error(e) => Some(e),
      _ => None,
    }
  }

  /// Loose truthiness used by flag-like attributes such as `DEBUG`.
  pub fn is_truthy(&self) -> bool {
    match self {
      Value::Boolean(b) => *b,
      Value::Number(n) => *n != 0,
      Value::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
      Value::Data(b) => !b.is_empty(),
      Value::Error(_) => false,
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Text(s.to_string())
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Text(s)
  }
}

impl From<Bytes> for Value {
  fn from(b: Bytes) -> Self {
    Value::Data(b)
  }
}

impl From<Vec<u8>> for Value {
  fn from(b: Vec<u8>) -> Self {
    Value::Data(Bytes::from(b))
  }
}

impl From<i64> for Value {
  fn from(n: i64) -> Self {
    Value::Number(n)
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<TransformError> for Value {
  fn from(e: TransformError) -> Self {
    Value::Error(e)
  }
}

/// What an attribute currently holds, as seen from outside the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
  /// Never set.
  Unset,
  /// Explicitly set to the null / end-of-stream marker.
  Null,
  Set(Value),
  /// A source is waiting for the node to activate before it delivers.
  Deferred,
}

impl AttributeValue {
  pub fn is_unset(&self) -> bool {
    matches!(self, AttributeValue::Unset)
  }

  pub fn value(&self) -> Option<&Value> {
    match self {
      AttributeValue::Set(v) => Some(v),
      _ => None,
    }
  }

  pub fn into_value(self) -> Option<Value> {
    match self {
      AttributeValue::Set(v) => Some(v),
      _ => None,
    }
  }
}
