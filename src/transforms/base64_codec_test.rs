//! Tests for the streaming base64 codecs.

use crate::context::NodeContext;
use crate::error::ErrorKind;
use crate::transform::Transform;
use crate::transforms::{Base64Decode, Base64Encode};
use crate::types::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;

async fn run(t: &mut dyn Transform, chunks: Vec<Value>) -> Vec<u8> {
  let ctx = NodeContext::detached();
  let mut out = Vec::new();
  for chunk in chunks.into_iter().map(Some).chain(std::iter::once(None)) {
    if let Some(v) = t.process_data(&ctx, chunk).await.unwrap() {
      out.extend_from_slice(v.as_bytes().unwrap());
    }
  }
  out
}

fn split(data: &[u8], cuts: &[usize]) -> Vec<Value> {
  let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
  points.sort_unstable();
  points.dedup();
  let mut chunks = Vec::new();
  let mut start = 0;
  for p in points.into_iter().chain(std::iter::once(data.len())) {
    if p > start {
      chunks.push(Value::Data(data[start..p].to_vec().into()));
      start = p;
    }
  }
  chunks
}

#[tokio::test]
async fn encode_carries_partial_groups() {
  let mut e = Base64Encode::new();
  let out = run(&mut e, vec![Value::from("a"), Value::from("bc"), Value::from("de")]).await;
  assert_eq!(out, b"YWJjZGU=");
}

#[tokio::test]
async fn encode_outputs_text() {
  let ctx = NodeContext::detached();
  let mut e = Base64Encode::new();
  let out = e.process_data(&ctx, Some(Value::from("abc"))).await.unwrap();
  assert_eq!(out, Some(Value::Text("YWJj".to_string())));
}

#[tokio::test]
async fn decode_ignores_whitespace_and_split_symbols() {
  let mut d = Base64Decode::new();
  let out = run(&mut d, vec![Value::from("YW"), Value::from("Jj\nZG"), Value::from("U=")]).await;
  assert_eq!(out, b"abcde");
}

#[tokio::test]
async fn decode_accepts_unpadded_tail() {
  let mut d = Base64Decode::new();
  let out = run(&mut d, vec![Value::from("YWJjZGU")]).await;
  assert_eq!(out, b"abcde");
}

#[tokio::test]
async fn decode_rejects_garbage() {
  let ctx = NodeContext::detached();
  let mut d = Base64Decode::new();
  let err = d.process_data(&ctx, Some(Value::from("@@@@"))).await.unwrap_err();
  assert_eq!(err.kind, ErrorKind::InvalidInput);
}

proptest! {
  #[test]
  fn encoding_is_independent_of_chunk_boundaries(
    data in proptest::collection::vec(any::<u8>(), 0..200),
    cuts in proptest::collection::vec(any::<usize>(), 0..8),
  ) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let encoded = rt.block_on(async {
      let mut e = Base64Encode::new();
      run(&mut e, split(&data, &cuts)).await
    });
    let expected = STANDARD.encode(&data);
    prop_assert_eq!(&encoded, expected.as_bytes());

    let decoded = rt.block_on(async {
      let mut d = Base64Decode::new();
      run(&mut d, split(&encoded, &cuts)).await
    });
    prop_assert_eq!(decoded, data);
  }
}
