//! Identity transform: forwards every chunk unchanged.

use crate::transform::Transform;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl PassThrough {
  pub const TYPE: &'static str = "identity";

  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl Transform for PassThrough {
  fn type_name(&self) -> &str {
    Self::TYPE
  }
}
