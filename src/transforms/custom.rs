//! Custom transform: a body assembled from closures.
//!
//! Every hook is optional; an unset hook behaves like the [Transform] default.

use crate::context::NodeContext;
use crate::error::Result;
use crate::node::Node;
use crate::transform::Transform;
use crate::types::{AttributeSpec, INPUT, Value};
use async_trait::async_trait;
use std::collections::HashMap;

type ProcessFn = Box<dyn FnMut(&NodeContext, Option<Value>) -> Result<Option<Value>> + Send>;
type ChangedFn = Box<dyn FnMut(&NodeContext, Option<&Value>) -> Result<()> + Send>;
type ValidateFn = Box<dyn Fn(Option<&Value>) -> Result<()> + Send>;
type CanExecuteFn = Box<dyn Fn(&NodeContext) -> Result<()> + Send>;
type StartingFn = Box<dyn FnMut(&NodeContext) -> Result<()> + Send>;
type FinalizeFn = Box<dyn FnMut(&NodeContext) + Send>;
type ExternalizeFn = Box<dyn Fn() -> Option<serde_json::Value> + Send>;
type InternalizeFn = Box<dyn FnMut(serde_json::Value) -> Result<()> + Send>;

pub struct CustomTransform {
  type_name: String,
  attributes: Vec<AttributeSpec>,
  handles_errors_directly: bool,
  always_self_notify: bool,
  process: Option<ProcessFn>,
  changed: HashMap<String, ChangedFn>,
  validate: HashMap<String, ValidateFn>,
  can_execute: Option<CanExecuteFn>,
  starting: Option<StartingFn>,
  finalize: Option<FinalizeFn>,
  externalize: Option<ExternalizeFn>,
  internalize: Option<InternalizeFn>,
}

impl CustomTransform {
  pub fn builder(type_name: impl Into<String>) -> CustomTransformBuilder {
    CustomTransformBuilder {
      inner: CustomTransform {
        type_name: type_name.into(),
        attributes: AttributeSpec::pass_through(),
        handles_errors_directly: false,
        always_self_notify: false,
        process: None,
        changed: HashMap::new(),
        validate: HashMap::new(),
        can_execute: None,
        starting: None,
        finalize: None,
        externalize: None,
        internalize: None,
      },
    }
  }
}

pub struct CustomTransformBuilder {
  inner: CustomTransform,
}

impl CustomTransformBuilder {
  /// Declares an attribute besides `INPUT`/`OUTPUT`.
  pub fn attribute(mut self, spec: AttributeSpec) -> Self {
    self.inner.attributes.retain(|a| a.name != spec.name);
    self.inner.attributes.push(spec);
    self
  }

  /// Replaces the declared attributes, dropping the default `INPUT`/`OUTPUT` pair.
  pub fn attributes(mut self, specs: Vec<AttributeSpec>) -> Self {
    self.inner.attributes = specs;
    self
  }

  pub fn handles_errors_directly(mut self, yes: bool) -> Self {
    self.inner.handles_errors_directly = yes;
    self
  }

  pub fn always_self_notify(mut self, yes: bool) -> Self {
    self.inner.always_self_notify = yes;
    self
  }

  /// Per-chunk processing of `INPUT`; a returned value goes to `OUTPUT`.
  pub fn process_data<F>(mut self, f: F) -> Self
  where
    F: FnMut(&NodeContext, Option<Value>) -> Result<Option<Value>> + Send + 'static,
  {
    self.inner.process = Some(Box::new(f));
    self
  }

  /// Runs when `attribute` changes, before the engine's default handling.
  pub fn on_attribute_changed<F>(mut self, attribute: impl Into<String>, f: F) -> Self
  where
    F: FnMut(&NodeContext, Option<&Value>) -> Result<()> + Send + 'static,
  {
    self.inner.changed.insert(attribute.into(), Box::new(f));
    self
  }

  pub fn validate<F>(mut self, attribute: impl Into<String>, f: F) -> Self
  where
    F: Fn(Option<&Value>) -> Result<()> + Send + 'static,
  {
    self.inner.validate.insert(attribute.into(), Box::new(f));
    self
  }

  pub fn can_execute<F>(mut self, f: F) -> Self
  where
    F: Fn(&NodeContext) -> Result<()> + Send + 'static,
  {
    self.inner.can_execute = Some(Box::new(f));
    self
  }

  pub fn starting_execution<F>(mut self, f: F) -> Self
  where
    F: FnMut(&NodeContext) -> Result<()> + Send + 'static,
  {
    self.inner.starting = Some(Box::new(f));
    self
  }

  pub fn finalize<F>(mut self, f: F) -> Self
  where
    F: FnMut(&NodeContext) + Send + 'static,
  {
    self.inner.finalize = Some(Box::new(f));
    self
  }

  pub fn externalize<F>(mut self, f: F) -> Self
  where
    F: Fn() -> Option<serde_json::Value> + Send + 'static,
  {
    self.inner.externalize = Some(Box::new(f));
    self
  }

  pub fn internalize<F>(mut self, f: F) -> Self
  where
    F: FnMut(serde_json::Value) -> Result<()> + Send + 'static,
  {
    self.inner.internalize = Some(Box::new(f));
    self
  }

  pub fn build(self) -> CustomTransform {
    self.inner
  }

  pub fn into_node(self) -> Node {
    Node::new(self.build())
  }
}

#[async_trait]
impl Transform for CustomTransform {
  fn type_name(&self) -> &str {
    &self.type_name
  }

  fn attributes(&self) -> Vec<AttributeSpec> {
    self.attributes.clone()
  }

  fn handles_errors_directly(&self) -> bool {
    self.handles_errors_directly
  }

  fn always_self_notify(&self) -> bool {
    self.always_self_notify
  }

  fn validate_attribute(&self, attribute: &str, value: Option<&Value>) -> Result<()> {
    match self.validate.get(attribute) {
      Some(f) => f(value),
      None => Ok(()),
    }
  }

  fn can_execute(&self, ctx: &NodeContext) -> Result<()> {
    match &self.can_execute {
      Some(f) => f(ctx),
      None => Ok(()),
    }
  }

  async fn starting_execution(&mut self, ctx: &NodeContext) -> Result<()> {
    match &mut self.starting {
      Some(f) => f(ctx),
      None => Ok(()),
    }
  }

  async fn process_data(&mut self, ctx: &NodeContext, chunk: Option<Value>) -> Result<Option<Value>> {
    match &mut self.process {
      Some(f) => f(ctx, chunk),
      None => Ok(chunk),
    }
  }

  async fn attribute_changed(
    &mut self,
    ctx: &NodeContext,
    attribute: &str,
    value: Option<Value>,
  ) -> Result<()> {
    if let Some(f) = self.changed.get_mut(attribute) {
      f(ctx, value.as_ref())?;
    }
    if attribute == INPUT {
      self.input_changed(ctx, value).await
    } else {
      ctx.propagate(attribute, value).await
    }
  }

  async fn finalize(&mut self, ctx: &NodeContext) {
    if let Some(f) = &mut self.finalize {
      f(ctx);
    }
  }

  fn externalize(&self) -> Option<serde_json::Value> {
    self.externalize.as_ref().and_then(|f| f())
  }

  fn internalize(&mut self, data: serde_json::Value) -> Result<()> {
    match &mut self.internalize {
      Some(f) => f(data),
      None => Ok(()),
    }
  }
}
