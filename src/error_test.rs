//! Tests for `TransformError`.

use super::{ErrorKind, TransformError};

#[test]
fn with_origin_keeps_first_origin() {
  let e = TransformError::aborted("boom").with_origin("a").with_origin("b");
  assert_eq!(e.origin.as_deref(), Some("a"));
}

#[test]
fn display_includes_origin() {
  let e = TransformError::invalid_input("bad chunk").with_origin("decoder");
  assert_eq!(e.to_string(), "invalid input: bad chunk (from decoder)");
}

#[test]
fn display_without_origin() {
  let e = TransformError::aborted("stop");
  assert_eq!(e.to_string(), "aborted: stop");
}

#[test]
fn missing_required_lists_names() {
  let e = TransformError::missing_required("enc", &["KEY".to_string(), "SALT".to_string()]);
  assert_eq!(e.kind, ErrorKind::MissingRequiredAttributes);
  assert!(e.message.contains("KEY, SALT"));
}

#[test]
fn io_out_of_memory_maps_to_resource_exhausted() {
  let e: TransformError = std::io::Error::from(std::io::ErrorKind::OutOfMemory).into();
  assert_eq!(e.kind, ErrorKind::ResourceExhausted);
  let e: TransformError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
  assert_eq!(e.kind, ErrorKind::Io);
}

#[test]
fn configuration_kinds() {
  assert!(ErrorKind::InvalidConnection.is_configuration());
  assert!(ErrorKind::NoOutput.is_configuration());
  assert!(!ErrorKind::Aborted.is_configuration());
  assert!(!ErrorKind::ResourceExhausted.is_configuration());
}

#[test]
fn serializes_kind_as_snake_case() {
  let e = TransformError::new(ErrorKind::ResourceExhausted, "oom");
  let v = serde_json::to_value(&e).unwrap();
  assert_eq!(v["kind"], "resource_exhausted");
  assert_eq!(v["origin"], serde_json::Value::Null);
}
