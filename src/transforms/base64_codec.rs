//! Streaming base64 codecs.
//!
//! Chunk boundaries are arbitrary, so each side carries the incomplete tail of
//! a chunk (up to 2 raw bytes when encoding, up to 3 symbols when decoding)
//! into the next one. The tail is flushed at end of stream.

use crate::context::NodeContext;
use crate::error::{Result, TransformError};
use crate::transform::Transform;
use crate::types::Value;
use async_trait::async_trait;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD, STANDARD};
use base64::engine::DecodePaddingMode;

/// Decoder that accepts a final group with or without padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
  &alphabet::STANDARD,
  PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

fn chunk_bytes(chunk: &Value) -> Result<&[u8]> {
  chunk.as_bytes().ok_or_else(|| {
    TransformError::invalid_input(format!("base64 expects text or data, got {:?}", chunk))
  })
}

/// Encodes a byte stream; output chunks are text.
#[derive(Debug, Default)]
pub struct Base64Encode {
  carry: Vec<u8>,
}

impl Base64Encode {
  pub const TYPE: &'static str = "base64-encode";

  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Transform for Base64Encode {
  fn type_name(&self) -> &str {
    Self::TYPE
  }

  async fn process_data(&mut self, _ctx: &NodeContext, chunk: Option<Value>) -> Result<Option<Value>> {
    let Some(chunk) = chunk else {
      if self.carry.is_empty() {
        return Ok(None);
      }
      let tail = STANDARD.encode(&self.carry);
      self.carry.clear();
      return Ok(Some(Value::Text(tail)));
    };
    self.carry.extend_from_slice(chunk_bytes(&chunk)?);
    let whole = self.carry.len() / 3 * 3;
    if whole == 0 {
      return Ok(None);
    }
    let encoded = STANDARD.encode(&self.carry[..whole]);
    self.carry.drain(..whole);
    Ok(Some(Value::Text(encoded)))
  }
}

/// Decodes a base64 stream; whitespace is ignored, output chunks are data.
#[derive(Debug, Default)]
pub struct Base64Decode {
  carry: Vec<u8>,
}

impl Base64Decode {
  pub const TYPE: &'static str = "base64-decode";

  pub fn new() -> Self {
    Self::default()
  }

  fn decode(symbols: &[u8]) -> Result<Vec<u8>> {
    LENIENT
      .decode(symbols)
      .map_err(|e| TransformError::invalid_input(format!("invalid base64: {e}")))
  }
}

#[async_trait]
impl Transform for Base64Decode {
  fn type_name(&self) -> &str {
    Self::TYPE
  }

  async fn process_data(&mut self, _ctx: &NodeContext, chunk: Option<Value>) -> Result<Option<Value>> {
    let Some(chunk) = chunk else {
      if self.carry.is_empty() {
        return Ok(None);
      }
      let tail = Self::decode(&std::mem::take(&mut self.carry))?;
      return Ok((!tail.is_empty()).then(|| Value::Data(tail.into())));
    };
    self.carry.extend(
      chunk_bytes(&chunk)?
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace()),
    );
    let whole = self.carry.len() / 4 * 4;
    if whole == 0 {
      return Ok(None);
    }
    let decoded = Self::decode(&self.carry[..whole])?;
    self.carry.drain(..whole);
    Ok(Some(Value::Data(decoded.into())))
  }
}
