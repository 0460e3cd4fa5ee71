//! Tests for `CustomTransform`.

use crate::context::NodeContext;
use crate::error::{ErrorKind, TransformError};
use crate::transform::Transform;
use crate::transforms::CustomTransform;
use crate::types::{AttributeSpec, INPUT, OUTPUT, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn default_attributes_plus_extra() {
  let t = CustomTransform::builder("salted")
    .attribute(AttributeSpec::new("SALT").required())
    .build();
  let names: Vec<String> = t.attributes().into_iter().map(|a| a.name).collect();
  assert_eq!(names, vec![INPUT, OUTPUT, "SALT"]);
  assert_eq!(t.type_name(), "salted");
}

#[test]
fn redeclaring_an_attribute_replaces_it() {
  let t = CustomTransform::builder("x")
    .attribute(AttributeSpec::new(INPUT).stream())
    .build();
  let input: Vec<AttributeSpec> = t.attributes().into_iter().filter(|a| a.name == INPUT).collect();
  assert_eq!(input.len(), 1);
  assert!(!input[0].flags.required);
}

#[tokio::test]
async fn process_hook_replaces_default() {
  let ctx = NodeContext::detached();
  let mut t = CustomTransform::builder("upper")
    .process_data(|_, chunk| {
      Ok(chunk.and_then(|v| v.as_text().map(|s| Value::Text(s.to_uppercase()))))
    })
    .build();
  let out = t.process_data(&ctx, Some(Value::from("abc"))).await.unwrap();
  assert_eq!(out, Some(Value::from("ABC")));
}

#[test]
fn validate_hook_is_per_attribute() {
  let t = CustomTransform::builder("v")
    .validate("KEY", |v| match v {
      Some(Value::Text(s)) if s.len() == 4 => Ok(()),
      _ => Err(TransformError::invalid_input("KEY must be 4 chars")),
    })
    .build();
  assert!(t.validate_attribute("KEY", Some(&Value::from("abcd"))).is_ok());
  let err = t.validate_attribute("KEY", Some(&Value::from("ab"))).unwrap_err();
  assert_eq!(err.kind, ErrorKind::InvalidInput);
  assert!(t.validate_attribute("OTHER", None).is_ok());
}

#[tokio::test]
async fn lifecycle_hooks_run() {
  let ctx = NodeContext::detached();
  let started = Arc::new(AtomicUsize::new(0));
  let finalized = Arc::new(AtomicUsize::new(0));
  let (s, f) = (Arc::clone(&started), Arc::clone(&finalized));
  let mut t = CustomTransform::builder("life")
    .starting_execution(move |_| {
      s.fetch_add(1, Ordering::SeqCst);
      Ok(())
    })
    .finalize(move |_| {
      f.fetch_add(1, Ordering::SeqCst);
    })
    .can_execute(|_| Err(TransformError::invalid_input("not ready")))
    .build();
  t.starting_execution(&ctx).await.unwrap();
  t.finalize(&ctx).await;
  assert_eq!(started.load(Ordering::SeqCst), 1);
  assert_eq!(finalized.load(Ordering::SeqCst), 1);
  assert!(t.can_execute(&ctx).is_err());
}

#[test]
fn export_hooks_round_trip_state() {
  let stored = Arc::new(std::sync::Mutex::new(None));
  let sink = Arc::clone(&stored);
  let mut t = CustomTransform::builder("stateful")
    .externalize(|| Some(serde_json::json!({"rounds": 3})))
    .internalize(move |data| {
      *sink.lock().unwrap() = Some(data);
      Ok(())
    })
    .build();
  let data = t.externalize().unwrap();
  t.internalize(data.clone()).unwrap();
  assert_eq!(stored.lock().unwrap().clone(), Some(data));
}

#[tokio::test]
async fn changed_hook_runs_for_named_attribute() {
  let ctx = NodeContext::detached();
  let seen = Arc::new(AtomicUsize::new(0));
  let counter = Arc::clone(&seen);
  let mut t = CustomTransform::builder("watch")
    .on_attribute_changed(INPUT, move |_, v| {
      assert_eq!(v, Some(&Value::from("fast")));
      counter.fetch_add(1, Ordering::SeqCst);
      Ok(())
    })
    .build();
  t.attribute_changed(&ctx, INPUT, Some(Value::from("fast")))
    .await
    .unwrap();
  assert_eq!(seen.load(Ordering::SeqCst), 1);
}
