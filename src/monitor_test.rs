//! Tests for the monitor transform.

use crate::context::NodeContext;
use crate::error::TransformError;
use crate::monitor::Monitor;
use crate::transform::Transform;
use crate::types::{Delivery, INPUT, Value};
use tokio::sync::{mpsc, oneshot};

#[tokio::test]
async fn data_then_single_terminal_delivery() {
  let ctx = NodeContext::detached();
  let (sink, mut rx) = mpsc::unbounded_channel();
  let (done, finished) = oneshot::channel();
  let mut m = Monitor::new(sink, done);
  assert!(m.handles_errors_directly());

  m.attribute_changed(&ctx, INPUT, Some(Value::from("a"))).await.unwrap();
  m.attribute_changed(&ctx, INPUT, None).await.unwrap();
  m.attribute_changed(&ctx, INPUT, Some(Value::from("late"))).await.unwrap();
  m.attribute_changed(&ctx, INPUT, None).await.unwrap();
  drop(m);

  let mut got = Vec::new();
  while let Some(d) = rx.recv().await {
    got.push(d);
  }
  assert_eq!(got, vec![Delivery::data(Value::from("a")), Delivery::end()]);
  assert!(finished.await.is_ok());
}

#[tokio::test]
async fn error_is_the_terminal_delivery() {
  let ctx = NodeContext::detached();
  let (sink, mut rx) = mpsc::unbounded_channel();
  let (done, _finished) = oneshot::channel();
  let mut m = Monitor::new(sink, done);
  let err = TransformError::aborted("gone").with_origin("b");
  m.attribute_changed(&ctx, INPUT, Some(Value::Error(err.clone())))
    .await
    .unwrap();
  m.attribute_changed(&ctx, INPUT, None).await.unwrap();
  assert_eq!(rx.recv().await, Some(Delivery::failed(err)));
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn other_attributes_are_ignored() {
  let ctx = NodeContext::detached();
  let (sink, mut rx) = mpsc::unbounded_channel();
  let (done, _finished) = oneshot::channel();
  let mut m = Monitor::new(sink, done);
  m.attribute_changed(&ctx, "DEBUG", Some(Value::Boolean(true)))
    .await
    .unwrap();
  assert!(rx.try_recv().is_err());
}
