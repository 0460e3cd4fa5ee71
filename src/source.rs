//! Sources: producers that feed a node attribute once the node has activated.
//!
//! Deferred attributes park their configured value in a [SingleShotSource];
//! streaming inputs are fed by a [StreamSource] over any `AsyncRead`.

use crate::node::NodeInner;
use crate::types::Value;
use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::{Arc, Weak};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{trace, warn};

/// Something that pushes values into one attribute after activation.
#[async_trait]
pub trait Source: Send + 'static {
  async fn run(self: Box<Self>, destination: Destination);
}

/// Attribute a running [Source] writes to.
pub struct Destination {
  node: Weak<NodeInner>,
  attribute: String,
}

impl Destination {
  pub(crate) fn new(node: Weak<NodeInner>, attribute: &str) -> Self {
    Self {
      node,
      attribute: attribute.to_string(),
    }
  }

  pub fn attribute(&self) -> &str {
    &self.attribute
  }

  /// Queues one value and waits until the node took it. False once the node
  /// is gone, finalizing or aborted: the source should stop.
  pub async fn send(&self, value: Option<Value>) -> bool {
    let Some(node) = self.live_node() else {
      return false;
    };
    if let Err(e) = node.enqueue(&self.attribute, value).await {
      warn!(node = %node.name(), attribute = %self.attribute, error = %e, "source delivery failed");
      return false;
    }
    true
  }

  /// Whether the destination attribute carries a null-terminated stream.
  pub fn is_stream(&self) -> bool {
    self
      .node
      .upgrade()
      .and_then(|n| n.attribute(&self.attribute).ok())
      .is_some_and(|a| a.flags().stream)
  }

  /// Preferred chunk size from the engine configuration.
  pub fn chunk_size(&self) -> usize {
    self
      .node
      .upgrade()
      .map(|n| n.config().stream_chunk_size)
      .unwrap_or(crate::config::DEFAULT_CHUNK_SIZE)
      .max(1)
  }

  fn live_node(&self) -> Option<Arc<NodeInner>> {
    let node = self.node.upgrade()?;
    if node.is_finalizing() || node.abort_error().is_some() {
      trace!(node = %node.name(), attribute = %self.attribute, "destination closed");
      return None;
    }
    Some(node)
  }
}

/// Delivers one configured value; a stream attribute also gets the closing null.
pub struct SingleShotSource {
  value: Option<Value>,
}

impl SingleShotSource {
  pub fn new(value: Option<Value>) -> Self {
    Self { value }
  }
}

#[async_trait]
impl Source for SingleShotSource {
  async fn run(self: Box<Self>, destination: Destination) {
    let terminate = self.value.is_some() && destination.is_stream();
    if destination.send(self.value).await && terminate {
      destination.send(None).await;
    }
  }
}

/// Reads a byte stream in fixed-size chunks, sends each as [Value::Data] and
/// closes with null. A read error is sent as [Value::Error].
pub struct StreamSource {
  reader: Box<dyn AsyncRead + Send + Unpin>,
  chunk_size: Option<usize>,
}

impl StreamSource {
  pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
    Self {
      reader: Box::new(reader),
      chunk_size: None,
    }
  }

  /// Overrides the configured chunk size.
  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = Some(chunk_size.max(1));
    self
  }
}

#[async_trait]
impl Source for StreamSource {
  async fn run(mut self: Box<Self>, destination: Destination) {
    let chunk_size = self.chunk_size.unwrap_or_else(|| destination.chunk_size());
    let mut buf = BytesMut::with_capacity(chunk_size);
    loop {
      buf.clear();
      let mut eof = false;
      while buf.len() < chunk_size {
        let mut limited = (&mut self.reader).take((chunk_size - buf.len()) as u64);
        match limited.read_buf(&mut buf).await {
          Ok(0) => {
            eof = true;
            break;
          }
          Ok(_) => {}
          Err(e) => {
            destination.send(Some(Value::Error(e.into()))).await;
            return;
          }
        }
      }
      if !buf.is_empty() && !destination.send(Some(Value::Data(buf.split().freeze()))).await {
        return;
      }
      if eof {
        destination.send(None).await;
        return;
      }
    }
  }
}
