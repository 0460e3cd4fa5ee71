//! Handle a transform uses from inside its hooks to talk to its own node.

use crate::error::{Result, TransformError};
use crate::node::NodeInner;
use crate::types::{AttributeValue, PushbackState, Value};
use std::sync::Arc;

/// A transform's view of the node it runs in.
#[derive(Clone)]
pub struct NodeContext {
  node: Arc<NodeInner>,
}

impl NodeContext {
  pub(crate) fn new(node: Arc<NodeInner>) -> Self {
    Self { node }
  }

  /// Context of a throwaway identity node, for driving hooks directly.
  #[cfg(test)]
  pub(crate) fn detached() -> Self {
    Self::new(crate::node::Node::new(crate::transforms::PassThrough).inner)
  }

  pub fn name(&self) -> String {
    self.node.name()
  }

  /// Current content of `attribute` (unknown attributes read as unset).
  pub fn get(&self, attribute: &str) -> AttributeValue {
    self
      .node
      .attribute(attribute)
      .map(|a| a.view())
      .unwrap_or(AttributeValue::Unset)
  }

  /// The value of `attribute`, if it holds one.
  pub fn value(&self, attribute: &str) -> Option<Value> {
    self.get(attribute).into_value()
  }

  /// Stores `value` on `attribute` and sends it to every connected attribute.
  pub async fn send(&self, attribute: &str, value: Option<Value>) -> Result<()> {
    self.node.send(attribute, value).await
  }

  /// Sends `value` along `attribute`'s connections without storing it.
  pub async fn propagate(&self, attribute: &str, value: Option<Value>) -> Result<()> {
    self.node.propagate(attribute, value).await
  }

  /// Holds `value` back and suspends `attribute` until another attribute changes.
  pub fn pushback(&self, attribute: &str, value: Option<Value>) -> Result<()> {
    self.node.pushback(attribute, value)
  }

  pub fn is_pushed_back(&self, attribute: &str) -> bool {
    self.pushback_state(attribute).is_pending()
  }

  pub fn pushback_state(&self, attribute: &str) -> PushbackState {
    self
      .node
      .attribute(attribute)
      .map(|a| a.state().pushback_state)
      .unwrap_or_default()
  }

  /// Aborts the whole graph once the current hook returns.
  pub fn abort(&self, error: TransformError) {
    let node = Arc::clone(&self.node);
    tokio::spawn(async move {
      node.abort(error).await;
    });
  }

  pub fn is_aborted(&self) -> bool {
    self.node.abort_error().is_some()
  }

  /// Marks the node as finished; its finalize hook runs after the current hook.
  pub fn finalize(&self) {
    self.node.request_finalize();
  }
}
