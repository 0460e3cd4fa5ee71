//! Engine tuning knobs: queue capacity, handoff timeout, stream chunk size.

use crate::error::{Result, TransformError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default bounded capacity of every attribute queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Default time a synchronous attribute handoff may take before a deadlock warning.
pub const DEFAULT_SET_TIMEOUT_MS: u64 = 5_000;
/// Default read size of a [crate::StreamSource].
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Environment variable overriding [EngineConfig::queue_capacity].
pub const ENV_QUEUE_CAPACITY: &str = "TRANSFORM_QUEUE_CAPACITY";
/// Environment variable overriding [EngineConfig::set_timeout_ms].
pub const ENV_SET_TIMEOUT_MS: &str = "TRANSFORM_SET_TIMEOUT_MS";
/// Environment variable overriding [EngineConfig::stream_chunk_size].
pub const ENV_CHUNK_SIZE: &str = "TRANSFORM_CHUNK_SIZE";

/// Runtime configuration captured by a group when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Bounded capacity of each attribute's queue.
  pub queue_capacity: usize,
  /// Milliseconds to wait on an attribute handoff before warning and waiting forever.
  pub set_timeout_ms: u64,
  /// Bytes read per chunk by stream sources.
  pub stream_chunk_size: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      queue_capacity: DEFAULT_QUEUE_CAPACITY,
      set_timeout_ms: DEFAULT_SET_TIMEOUT_MS,
      stream_chunk_size: DEFAULT_CHUNK_SIZE,
    }
  }
}

impl EngineConfig {
  /// Defaults overlaid with the `TRANSFORM_*` environment variables.
  pub fn from_env() -> Self {
    Self::default().overlay(|key| std::env::var(key).ok())
  }

  /// Applies overrides looked up by `lookup`; unparsable or zero values are ignored.
  pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(v) = parse_positive(&lookup, ENV_QUEUE_CAPACITY) {
      self.queue_capacity = v as usize;
    }
    if let Some(v) = parse_positive(&lookup, ENV_SET_TIMEOUT_MS) {
      self.set_timeout_ms = v;
    }
    if let Some(v) = parse_positive(&lookup, ENV_CHUNK_SIZE) {
      self.stream_chunk_size = v as usize;
    }
    self
  }

  /// Rejects zero queue capacity or chunk size.
  pub fn validate(&self) -> Result<()> {
    if self.queue_capacity == 0 {
      return Err(TransformError::invalid_input("queue_capacity must be at least 1"));
    }
    if self.stream_chunk_size == 0 {
      return Err(TransformError::invalid_input("stream_chunk_size must be at least 1"));
    }
    Ok(())
  }

  pub fn set_timeout(&self) -> Duration {
    Duration::from_millis(self.set_timeout_ms)
  }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
  let raw = lookup(key)?;
  match raw.trim().parse::<u64>() {
    Ok(0) | Err(_) => {
      warn!(variable = key, value = %raw, "ignoring invalid engine setting");
      None
    }
    Ok(v) => Some(v),
  }
}
