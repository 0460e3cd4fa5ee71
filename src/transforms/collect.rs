//! Collect transform: concatenates a stream and emits it once at end of stream.

use crate::context::NodeContext;
use crate::error::{Result, TransformError};
use crate::transform::Transform;
use crate::types::Value;
use async_trait::async_trait;
use bytes::BytesMut;

/// Buffers every chunk. Text chunks stay text if every chunk was text.
#[derive(Debug)]
pub struct Collect {
  buf: BytesMut,
  chunks: usize,
  all_text: bool,
}

impl Collect {
  pub const TYPE: &'static str = "collect";

  pub fn new() -> Self {
    Self {
      buf: BytesMut::new(),
      chunks: 0,
      all_text: true,
    }
  }

  fn take(&mut self) -> Result<Option<Value>> {
    if self.chunks == 0 {
      return Ok(None);
    }
    self.chunks = 0;
    let bytes = self.buf.split().freeze();
    if !std::mem::replace(&mut self.all_text, true) {
      return Ok(Some(Value::Data(bytes)));
    }
    String::from_utf8(bytes.to_vec())
      .map(|s| Some(Value::Text(s)))
      .map_err(|e| TransformError::internal(format!("collected text is not utf-8: {e}")))
  }
}

impl Default for Collect {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Transform for Collect {
  fn type_name(&self) -> &str {
    Self::TYPE
  }

  async fn process_data(&mut self, _ctx: &NodeContext, chunk: Option<Value>) -> Result<Option<Value>> {
    let Some(chunk) = chunk else {
      return self.take();
    };
    let bytes = chunk.as_bytes().ok_or_else(|| {
      TransformError::invalid_input(format!("collect expects text or data, got {:?}", chunk))
    })?;
    self.buf.extend_from_slice(bytes);
    self.all_text &= matches!(chunk, Value::Text(_));
    self.chunks += 1;
    Ok(None)
  }
}
