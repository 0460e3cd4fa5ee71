//! Tests for `PushbackState`.

use super::PushbackState;

#[test]
fn default_is_empty() {
  assert_eq!(PushbackState::default(), PushbackState::Empty);
}

#[test]
fn pending_states_hold_the_queue() {
  assert!(PushbackState::Value.is_pending());
  assert!(PushbackState::PresentedOnce.is_pending());
  assert!(!PushbackState::Repush.is_pending());
  assert!(!PushbackState::Empty.is_pending());
}

#[test]
fn only_empty_and_repush_accept_pushback() {
  assert!(PushbackState::Empty.accepts_pushback());
  assert!(PushbackState::Repush.accepts_pushback());
  assert!(!PushbackState::Value.accepts_pushback());
  assert!(!PushbackState::PresentedOnce.accepts_pushback());
  assert!(!PushbackState::Discard.accepts_pushback());
}

#[test]
fn display() {
  assert_eq!(PushbackState::PresentedOnce.to_string(), "presented_once");
  assert_eq!(PushbackState::Repush.to_string(), "repush");
}
