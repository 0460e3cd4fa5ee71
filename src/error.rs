//! Error type shared by the construction API and the running graph.
//!
//! A [TransformError] is both returned synchronously (configuration errors) and
//! carried through the graph inside [crate::Value::Error] (runtime errors and
//! aborts), so it is `Clone` and serialisable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Broad category of a [TransformError].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  MissingRequiredAttributes,
  InvalidConnection,
  UnknownAttribute,
  UnknownType,
  AlreadyExecuting,
  NoOutput,
  MultipleOutputs,
  InvalidInput,
  InvalidOperation,
  Aborted,
  ResourceExhausted,
  Io,
  Serialization,
  Internal,
}

impl ErrorKind {
  /// True for errors raised synchronously by the construction API.
  pub fn is_configuration(self) -> bool {
    matches!(
      self,
      ErrorKind::MissingRequiredAttributes
        | ErrorKind::InvalidConnection
        | ErrorKind::UnknownAttribute
        | ErrorKind::UnknownType
        | ErrorKind::AlreadyExecuting
        | ErrorKind::NoOutput
        | ErrorKind::MultipleOutputs
    )
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ErrorKind::MissingRequiredAttributes => "missing required attributes",
      ErrorKind::InvalidConnection => "invalid connection",
      ErrorKind::UnknownAttribute => "unknown attribute",
      ErrorKind::UnknownType => "unknown transform type",
      ErrorKind::AlreadyExecuting => "already executing",
      ErrorKind::NoOutput => "no output",
      ErrorKind::MultipleOutputs => "multiple outputs",
      ErrorKind::InvalidInput => "invalid input",
      ErrorKind::InvalidOperation => "invalid operation",
      ErrorKind::Aborted => "aborted",
      ErrorKind::ResourceExhausted => "resource exhausted",
      ErrorKind::Io => "i/o error",
      ErrorKind::Serialization => "serialization error",
      ErrorKind::Internal => "internal error",
    };
    f.write_str(s)
  }
}

/// Error raised by the engine or reported by a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}{}", .origin.as_ref().map(|o| format!(" (from {o})")).unwrap_or_default())]
pub struct TransformError {
  /// Category of the failure.
  pub kind: ErrorKind,
  /// Human readable detail.
  pub message: String,
  /// Name of the node that started the abort, once annotated.
  pub origin: Option<String>,
}

impl TransformError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      origin: None,
    }
  }

  /// Lists the missing attribute names in the message.
  pub fn missing_required(node: &str, names: &[String]) -> Self {
    Self::new(
      ErrorKind::MissingRequiredAttributes,
      format!(
        "node '{}' is missing required attributes: {}",
        node,
        names.join(", ")
      ),
    )
  }

  pub fn invalid_connection(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidConnection, message)
  }

  pub fn unknown_attribute(node: &str, attribute: &str) -> Self {
    Self::new(
      ErrorKind::UnknownAttribute,
      format!("node '{}' has no attribute '{}'", node, attribute),
    )
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidInput, message)
  }

  pub fn invalid_operation(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidOperation, message)
  }

  pub fn aborted(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Aborted, message)
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Internal, message)
  }

  /// Tags the error with the node that originated it. An existing origin is kept.
  pub fn with_origin(mut self, node: &str) -> Self {
    if self.origin.is_none() {
      self.origin = Some(node.to_string());
    }
    self
  }
}

impl From<std::io::Error> for TransformError {
  fn from(e: std::io::Error) -> Self {
    let kind = match e.kind() {
      std::io::ErrorKind::OutOfMemory => ErrorKind::ResourceExhausted,
      _ => ErrorKind::Io,
    };
    Self::new(kind, e.to_string())
  }
}

impl From<serde_json::Error> for TransformError {
  fn from(e: serde_json::Error) -> Self {
    Self::new(ErrorKind::Serialization, e.to_string())
  }
}
