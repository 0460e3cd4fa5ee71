//! Tests for `Delivery`.

use super::{Delivery, Value};
use crate::error::TransformError;

#[test]
fn data_is_not_final() {
  let d = Delivery::data(Value::from("x"));
  assert!(!d.is_final);
  assert!(d.error.is_none());
  assert_eq!(d.value, Some(Value::from("x")));
}

#[test]
fn end_is_final_without_value() {
  let d = Delivery::end();
  assert!(d.is_final);
  assert!(d.value.is_none());
  assert!(d.error.is_none());
}

#[test]
fn failed_carries_error() {
  let d = Delivery::failed(TransformError::aborted("stop"));
  assert!(d.is_final);
  assert_eq!(d.error.map(|e| e.message), Some("stop".to_string()));
}
