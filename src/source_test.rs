//! Tests for single-shot and stream sources.

use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::execution::execute;
use crate::group::GroupTransform;
use crate::node::Node;
use crate::source::StreamSource;
use crate::transforms::{Collect, CustomTransform};
use crate::types::{INPUT, Value};
use bytes::Bytes;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

struct Broken;

impl AsyncRead for Broken {
  fn poll_read(self: Pin<&mut Self>, _: &mut Context<'_>, _: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
    Poll::Ready(Err(io::Error::other("disk gone")))
  }
}

#[tokio::test]
async fn stream_source_feeds_whole_input() {
  let node = Node::new(Collect::new());
  node
    .set_attribute_source(INPUT, StreamSource::new(&b"hello world"[..]).with_chunk_size(3))
    .unwrap();
  let out = node.execute().await.unwrap();
  assert_eq!(out, Some(Value::Data(Bytes::from_static(b"hello world"))));
}

#[tokio::test]
async fn stream_source_sends_full_chunks() {
  let sizes = Arc::new(Mutex::new(Vec::new()));
  let seen = Arc::clone(&sizes);
  let node = CustomTransform::builder("sizes")
    .process_data(move |_, chunk| {
      if let Some(v) = &chunk {
        seen.lock().unwrap().push(v.as_bytes().map_or(0, <[u8]>::len));
      }
      Ok(chunk)
    })
    .into_node();
  node
    .set_attribute_source(INPUT, StreamSource::new(&b"0123456789"[..]).with_chunk_size(4))
    .unwrap();
  node.execute().await.unwrap();
  assert_eq!(*sizes.lock().unwrap(), vec![4, 4, 2]);
}

#[tokio::test]
async fn empty_stream_only_terminates() {
  let node = Node::new(Collect::new());
  node
    .set_attribute_source(INPUT, StreamSource::new(&b""[..]))
    .unwrap();
  assert_eq!(node.execute().await.unwrap(), None);
}

#[tokio::test]
async fn read_error_ends_the_graph() {
  let node = Node::new(Collect::new());
  node.set_attribute_source(INPUT, StreamSource::new(Broken)).unwrap();
  let err = node.execute().await.unwrap_err();
  assert_eq!(err.kind, ErrorKind::Io);
  assert!(err.message.contains("disk gone"));
}

#[tokio::test]
async fn single_shot_value_is_followed_by_end_of_stream() {
  let node = Node::new(Collect::new());
  node.set_attribute(INPUT, Value::from("once")).await.unwrap();
  assert_eq!(node.execute().await.unwrap(), Some(Value::from("once")));
}

#[tokio::test]
async fn stream_source_reads_the_group_chunk_size() {
  let sizes = Arc::new(Mutex::new(Vec::new()));
  let seen = Arc::clone(&sizes);
  let node = CustomTransform::builder("sizes")
    .process_data(move |_, chunk| {
      if let Some(v) = &chunk {
        seen.lock().unwrap().push(v.as_bytes().map_or(0, <[u8]>::len));
      }
      Ok(chunk)
    })
    .into_node();
  node.set_attribute_source(INPUT, StreamSource::new(&b"abcde"[..])).unwrap();
  let group = GroupTransform::with_config(EngineConfig {
    stream_chunk_size: 2,
    ..EngineConfig::default()
  })
  .unwrap();
  group.add_member(&node).unwrap();
  let out = tokio::time::timeout(Duration::from_secs(5), execute(&group))
    .await
    .expect("execution finished");
  assert!(out.is_ok());
  assert_eq!(*sizes.lock().unwrap(), vec![2, 2, 1]);
}
