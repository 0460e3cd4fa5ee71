//! Tests for `Collect`.

use crate::context::NodeContext;
use crate::error::ErrorKind;
use crate::transform::Transform;
use crate::transforms::Collect;
use crate::types::Value;
use bytes::Bytes;

#[tokio::test]
async fn text_chunks_concatenate_to_text() {
  let ctx = NodeContext::detached();
  let mut c = Collect::new();
  assert_eq!(c.process_data(&ctx, Some(Value::from("ab"))).await.unwrap(), None);
  assert_eq!(c.process_data(&ctx, Some(Value::from("cd"))).await.unwrap(), None);
  let out = c.process_data(&ctx, None).await.unwrap();
  assert_eq!(out, Some(Value::Text("abcd".to_string())));
}

#[tokio::test]
async fn any_data_chunk_makes_output_data() {
  let ctx = NodeContext::detached();
  let mut c = Collect::new();
  c.process_data(&ctx, Some(Value::from("ab"))).await.unwrap();
  c.process_data(&ctx, Some(Value::Data(Bytes::from_static(b"\x00\x01")))).await.unwrap();
  let out = c.process_data(&ctx, None).await.unwrap();
  assert_eq!(out, Some(Value::Data(Bytes::from_static(b"ab\x00\x01"))));
}

#[tokio::test]
async fn empty_stream_emits_nothing() {
  let ctx = NodeContext::detached();
  let mut c = Collect::new();
  assert_eq!(c.process_data(&ctx, None).await.unwrap(), None);
}

#[tokio::test]
async fn numbers_are_rejected() {
  let ctx = NodeContext::detached();
  let mut c = Collect::new();
  let err = c.process_data(&ctx, Some(Value::Number(3))).await.unwrap_err();
  assert_eq!(err.kind, ErrorKind::InvalidInput);
}

#[tokio::test]
async fn state_resets_after_end_of_stream() {
  let ctx = NodeContext::detached();
  let mut c = Collect::new();
  c.process_data(&ctx, Some(Value::Data(Bytes::from_static(b"x")))).await.unwrap();
  c.process_data(&ctx, None).await.unwrap();
  c.process_data(&ctx, Some(Value::from("y"))).await.unwrap();
  let out = c.process_data(&ctx, None).await.unwrap();
  assert_eq!(out, Some(Value::Text("y".to_string())));
}
