//! The contract a concrete transform body implements.
//!
//! The engine owns the attributes, queues and lifecycle; a [Transform] only
//! supplies hooks. Every hook runs with the node's body locked, so hooks of
//! one node never run concurrently.

use crate::context::NodeContext;
use crate::error::Result;
use crate::types::{AttributeSpec, INPUT, OUTPUT, Value};
use async_trait::async_trait;

#[async_trait]
pub trait Transform: Send + 'static {
  /// Registry name of this transform kind.
  fn type_name(&self) -> &str;

  /// Attributes besides the reserved `ABORT`/`DEBUG` pair.
  fn attributes(&self) -> Vec<AttributeSpec> {
    AttributeSpec::pass_through()
  }

  /// When true, error values reaching `INPUT` are handed to [Transform::attribute_changed]
  /// instead of being forwarded to `OUTPUT` by the engine.
  fn handles_errors_directly(&self) -> bool {
    false
  }

  /// When true, non-deferred attributes notify the transform even before activation.
  fn always_self_notify(&self) -> bool {
    false
  }

  /// Checks a value about to be stored on `attribute`.
  fn validate_attribute(&self, _attribute: &str, _value: Option<&Value>) -> Result<()> {
    Ok(())
  }

  /// Final say during validation, after required attributes were checked.
  fn can_execute(&self, _ctx: &NodeContext) -> Result<()> {
    Ok(())
  }

  /// Setup hook run once when the node activates. An error aborts the graph.
  async fn starting_execution(&mut self, _ctx: &NodeContext) -> Result<()> {
    Ok(())
  }

  /// Processes one `INPUT` chunk (`None` at end of stream). A returned value goes to `OUTPUT`.
  async fn process_data(&mut self, _ctx: &NodeContext, chunk: Option<Value>) -> Result<Option<Value>> {
    Ok(chunk)
  }

  /// Called for every value delivered to one of this node's attributes.
  ///
  /// The default routes `INPUT` through [Transform::input_changed] and forwards
  /// every other attribute to its connections.
  async fn attribute_changed(
    &mut self,
    ctx: &NodeContext,
    attribute: &str,
    value: Option<Value>,
  ) -> Result<()> {
    if attribute == INPUT {
      self.input_changed(ctx, value).await
    } else {
      ctx.propagate(attribute, value).await
    }
  }

  /// Pass-through convention: process each chunk, then at end of stream
  /// forward the terminating null to `OUTPUT`. Nothing is forwarded while the
  /// chunk is pushed back.
  async fn input_changed(&mut self, ctx: &NodeContext, value: Option<Value>) -> Result<()> {
    let terminal = value.is_none();
    let produced = self.process_data(ctx, value).await?;
    if ctx.is_pushed_back(INPUT) {
      return Ok(());
    }
    if let Some(v) = produced {
      ctx.send(OUTPUT, Some(v)).await?;
    }
    if terminal {
      ctx.send(OUTPUT, None).await?;
    }
    Ok(())
  }

  /// Runs once when the node starts tearing down.
  async fn finalize(&mut self, _ctx: &NodeContext) {}

  /// Custom state written alongside the attributes when the graph is externalized.
  fn externalize(&self) -> Option<serde_json::Value> {
    None
  }

  fn internalize(&mut self, _data: serde_json::Value) -> Result<()> {
    Ok(())
  }
}
