//! Pushback state of an attribute.

use std::fmt;

/// Where an attribute is in the pushback protocol.
///
/// `Value` and `PresentedOnce` keep the attribute's queue suspended; the
/// engine only accepts a new pushback in `Empty` or `Repush`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushbackState {
  #[default]
  Empty,
  /// A value is held back and the queue is suspended.
  Value,
  /// The held value is being redelivered by a retry pass.
  Repush,
  /// A null was pushed back again with nothing else changed; retry passes skip it.
  PresentedOnce,
  Discard,
}

impl PushbackState {
  /// True while the attribute's queue must stay suspended.
  pub fn is_pending(self) -> bool {
    matches!(self, PushbackState::Value | PushbackState::PresentedOnce)
  }

  /// True when a new pushback is allowed.
  pub fn accepts_pushback(self) -> bool {
    matches!(self, PushbackState::Empty | PushbackState::Repush)
  }
}

impl fmt::Display for PushbackState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PushbackState::Empty => write!(f, "empty"),
      PushbackState::Value => write!(f, "value"),
      PushbackState::Repush => write!(f, "repush"),
      PushbackState::PresentedOnce => write!(f, "presented_once"),
      PushbackState::Discard => write!(f, "discard"),
    }
  }
}
