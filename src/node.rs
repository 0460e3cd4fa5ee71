//! Node: a transform body wrapped in attributes plus the propagation,
//! activation, pushback and abort state machine.
//!
//! [Node] is a cheap clonable handle. Everything that reaches a node from the
//! outside goes through one of its attribute queues or its activation queue;
//! transform hooks run with the body locked, one at a time.

use crate::attribute::{Attribute, AttributeJob, Slot};
use crate::config::EngineConfig;
use crate::context::NodeContext;
use crate::error::{ErrorKind, Result, TransformError};
use crate::execution::{self, ExecutionHandle};
use crate::group::GroupTransform;
use crate::queue::ActivationQueue;
use crate::source::{Destination, SingleShotSource, Source};
use crate::sync::{lock, read, write};
use crate::transform::Transform;
use crate::types::{
  ABORT, AttributeFlags, AttributeSpec, AttributeValue, DEBUG, Delivery, INPUT, MetaAttribute,
  OUTPUT, PushbackState, Value,
};
use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, instrument, trace, warn};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity; orders group member sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
  fn next() -> Self {
    NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
  }
}

impl fmt::Display for NodeId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Attributes held back by pushback, plus retry pass bookkeeping.
#[derive(Default)]
struct PushbackSet {
  pending: BTreeSet<String>,
  processing: bool,
  rerun: bool,
}

pub(crate) struct NodeInner {
  id: NodeId,
  name: RwLock<String>,
  type_name: String,
  attributes: RwLock<BTreeMap<String, Arc<Attribute>>>,
  body: tokio::sync::Mutex<Box<dyn Transform>>,
  handles_errors_directly: bool,
  always_self_notify: bool,
  is_active: AtomicBool,
  is_finalizing: AtomicBool,
  finalize_pending: AtomicBool,
  abort_error: OnceCell<TransformError>,
  told_group_about_abort: AtomicBool,
  debug: AtomicBool,
  group: Mutex<Option<GroupTransform>>,
  activation: ActivationQueue,
  pushbacks: Mutex<PushbackSet>,
  config: OnceCell<Arc<EngineConfig>>,
}

/// A node of the transform graph.
#[derive(Clone)]
pub struct Node {
  pub(crate) inner: Arc<NodeInner>,
}

impl PartialEq for Node {
  fn eq(&self, other: &Self) -> bool {
    self.inner.id == other.inner.id
  }
}

impl Eq for Node {}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("id", &self.inner.id)
      .field("name", &self.inner.name())
      .field("type", &self.inner.type_name)
      .field("active", &self.is_active())
      .finish()
  }
}

impl Node {
  pub fn new(transform: impl Transform) -> Self {
    Self::from_boxed(Box::new(transform))
  }

  pub fn from_boxed(transform: Box<dyn Transform>) -> Self {
    let type_name = transform.type_name().to_string();
    let mut attributes = BTreeMap::new();
    for spec in AttributeSpec::reserved()
      .into_iter()
      .chain(transform.attributes())
    {
      attributes.insert(spec.name.clone(), Arc::new(Attribute::new(spec)));
    }
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("{}_{}", type_name, &uuid[..8]);
    let inner = NodeInner {
      id: NodeId::next(),
      name: RwLock::new(name),
      type_name,
      attributes: RwLock::new(attributes),
      handles_errors_directly: transform.handles_errors_directly(),
      always_self_notify: transform.always_self_notify(),
      body: tokio::sync::Mutex::new(transform),
      is_active: AtomicBool::new(false),
      is_finalizing: AtomicBool::new(false),
      finalize_pending: AtomicBool::new(false),
      abort_error: OnceCell::new(),
      told_group_about_abort: AtomicBool::new(false),
      debug: AtomicBool::new(false),
      group: Mutex::new(None),
      activation: ActivationQueue::new(),
      pushbacks: Mutex::new(PushbackSet::default()),
      config: OnceCell::new(),
    };
    Self {
      inner: Arc::new(inner),
    }
  }

  pub fn id(&self) -> NodeId {
    self.inner.id
  }

  pub fn name(&self) -> String {
    self.inner.name()
  }

  pub fn set_name(&self, name: impl Into<String>) {
    *write(&self.inner.name) = name.into();
  }

  pub fn type_name(&self) -> &str {
    &self.inner.type_name
  }

  pub fn attribute_names(&self) -> Vec<String> {
    read(&self.inner.attributes).keys().cloned().collect()
  }

  pub fn has_attribute(&self, name: &str) -> bool {
    read(&self.inner.attributes).contains_key(name)
  }

  /// Declares an extra attribute. Only possible before the node runs.
  pub fn add_attribute(&self, spec: AttributeSpec) -> Result<()> {
    self.inner.ensure_inactive()?;
    let mut attributes = write(&self.inner.attributes);
    if attributes.contains_key(&spec.name) {
      return Err(TransformError::invalid_operation(format!(
        "node '{}' already has attribute '{}'",
        self.name(),
        spec.name
      )));
    }
    attributes.insert(spec.name.clone(), Arc::new(Attribute::new(spec)));
    Ok(())
  }

  pub fn attribute_flags(&self, name: &str) -> Result<AttributeFlags> {
    Ok(self.inner.attribute(name)?.flags())
  }

  /// Sets an attribute.
  ///
  /// Before the node is active this is configuration: the value is validated
  /// and stored (deferred attributes wrap it in a source). Once active the
  /// value goes through the attribute's queue and this returns after the
  /// node has handled it.
  pub async fn set_attribute(&self, name: &str, value: impl Into<Option<Value>>) -> Result<()> {
    let value = value.into();
    if self.inner.is_active() {
      let attr = self.inner.attribute(name)?;
      if !attr.flags().allow_external_mutation_while_running {
        return Err(TransformError::invalid_operation(format!(
          "attribute '{}' of '{}' cannot be set while the graph is running",
          name,
          self.name()
        )));
      }
      self.inner.enqueue(name, value).await
    } else {
      self.inner.configure(name, value).await
    }
  }

  /// Attaches a source that starts feeding `name` once the node activates.
  pub fn set_attribute_source(&self, name: &str, source: impl Source) -> Result<()> {
    self.inner.ensure_inactive()?;
    let attr = self.inner.attribute(name)?;
    attr.state().slot = Slot::Source(Box::new(source));
    Ok(())
  }

  pub fn get_attribute(&self, name: &str) -> Result<AttributeValue> {
    Ok(self.inner.attribute(name)?.view())
  }

  /// Reads one facet of an attribute.
  pub fn get_meta(&self, name: &str, meta: MetaAttribute) -> Result<serde_json::Value> {
    let attr = self.inner.attribute(name)?;
    let state = attr.state();
    let f = state.flags;
    let v = match meta {
      MetaAttribute::Value => match &state.slot {
        Slot::Set(Some(v)) => serde_json::to_value(v)?,
        _ => serde_json::Value::Null,
      },
      MetaAttribute::Name => serde_json::Value::String(attr.name().to_string()),
      MetaAttribute::Required => f.required.into(),
      MetaAttribute::RequiresOutboundConnection => f.requires_outbound_connection.into(),
      MetaAttribute::Deferred => f.deferred.into(),
      MetaAttribute::Stream => f.stream.into(),
      MetaAttribute::Externalize => f.externalize.into(),
      MetaAttribute::AllowExternalMutationWhileRunning => {
        f.allow_external_mutation_while_running.into()
      }
      MetaAttribute::HasOutboundConnections => (!state.connections.is_empty()).into(),
      MetaAttribute::HasInboundConnection => state.has_incoming_connection.into(),
    };
    Ok(v)
  }

  /// Writes one facet of an attribute. Flags take booleans; `Value` takes a serialized [Value].
  pub async fn set_meta(&self, name: &str, meta: MetaAttribute, value: serde_json::Value) -> Result<()> {
    if meta.is_read_only() {
      return Err(TransformError::invalid_operation(format!(
        "meta attribute {:?} is read only",
        meta
      )));
    }
    if meta == MetaAttribute::Value {
      let v: Option<Value> = serde_json::from_value(value)?;
      return self.set_attribute(name, v).await;
    }
    self.inner.ensure_inactive()?;
    let flag = value.as_bool().ok_or_else(|| {
      TransformError::invalid_input(format!("meta attribute {:?} expects a boolean", meta))
    })?;
    let attr = self.inner.attribute(name)?;
    let mut state = attr.state();
    let f = &mut state.flags;
    match meta {
      MetaAttribute::Required => f.required = flag,
      MetaAttribute::RequiresOutboundConnection => f.requires_outbound_connection = flag,
      MetaAttribute::Deferred => f.deferred = flag,
      MetaAttribute::Stream => f.stream = flag,
      MetaAttribute::Externalize => f.externalize = flag,
      MetaAttribute::AllowExternalMutationWhileRunning => {
        f.allow_external_mutation_while_running = flag
      }
      _ => {}
    }
    Ok(())
  }

  pub fn pushback_state(&self, name: &str) -> Result<PushbackState> {
    Ok(self.inner.attribute(name)?.state().pushback_state)
  }

  pub fn is_active(&self) -> bool {
    self.inner.is_active()
  }

  pub fn is_finalizing(&self) -> bool {
    self.inner.is_finalizing.load(Ordering::Acquire)
  }

  /// The error this node aborted with, once it has.
  pub fn abort_error(&self) -> Option<TransformError> {
    self.inner.abort_error().cloned()
  }

  /// Aborts the node, and through it the whole graph. Returns false when an
  /// earlier abort already won.
  pub async fn abort(&self, error: TransformError) -> bool {
    self.inner.abort(error).await
  }

  pub fn group(&self) -> Option<GroupTransform> {
    self.inner.group()
  }

  /// Runs the graph this node belongs to and returns the last data value it produced.
  pub async fn execute(&self) -> Result<Option<Value>> {
    execution::execute(&self.group_or_trivial()?).await
  }

  /// Runs the graph, handing every delivery to `callback` on a dedicated task.
  pub async fn execute_with<F>(&self, callback: F) -> Result<ExecutionHandle>
  where
    F: FnMut(Delivery) + Send + 'static,
  {
    execution::execute_with(&self.group_or_trivial()?, callback).await
  }

  fn group_or_trivial(&self) -> Result<GroupTransform> {
    if let Some(g) = self.group() {
      return Ok(g);
    }
    self.inner.ensure_inactive()?;
    let g = GroupTransform::new();
    g.add_member(self)?;
    Ok(g)
  }
}

impl NodeInner {
  pub(crate) fn name(&self) -> String {
    read(&self.name).clone()
  }

  pub(crate) fn is_active(&self) -> bool {
    self.is_active.load(Ordering::Acquire)
  }

  pub(crate) fn is_finalizing(&self) -> bool {
    self.is_finalizing.load(Ordering::Acquire)
  }

  pub(crate) fn abort_error(&self) -> Option<&TransformError> {
    self.abort_error.get()
  }

  pub(crate) fn group(&self) -> Option<GroupTransform> {
    lock(&self.group).clone()
  }

  pub(crate) fn set_group(&self, group: Option<GroupTransform>) {
    *lock(&self.group) = group;
  }

  pub(crate) fn attribute(&self, name: &str) -> Result<Arc<Attribute>> {
    read(&self.attributes)
      .get(name)
      .cloned()
      .ok_or_else(|| TransformError::unknown_attribute(&self.name(), name))
  }

  pub(crate) fn attributes(&self) -> Vec<Arc<Attribute>> {
    read(&self.attributes).values().cloned().collect()
  }

  pub(crate) async fn lock_body(&self) -> tokio::sync::MutexGuard<'_, Box<dyn Transform>> {
    self.body.lock().await
  }

  fn ensure_inactive(&self) -> Result<()> {
    if self.is_active() {
      return Err(TransformError::new(
        ErrorKind::AlreadyExecuting,
        format!("node '{}' is already executing", self.name()),
      ));
    }
    Ok(())
  }

  fn set_timeout(&self) -> std::time::Duration {
    self
      .config
      .get()
      .map(|c| c.set_timeout())
      .unwrap_or_else(|| EngineConfig::default().set_timeout())
  }

  pub(crate) fn config(&self) -> Arc<EngineConfig> {
    self
      .config
      .get()
      .cloned()
      .unwrap_or_else(|| Arc::new(EngineConfig::default()))
  }

  /// Configuration-time set: validate and store, no queue involved.
  async fn configure(self: &Arc<Self>, name: &str, value: Option<Value>) -> Result<()> {
    let attr = self.attribute(name)?;
    if name == ABORT {
      if let Some(v) = value {
        self.abort(abort_error_from(v)).await;
      }
      return Ok(());
    }
    self.lock_body().await.validate_attribute(name, value.as_ref())?;
    if name == DEBUG {
      self.set_debug(value.as_ref());
    }
    let flags = attr.flags();
    if flags.deferred {
      attr.state().slot = Slot::Source(Box::new(SingleShotSource::new(value)));
      return Ok(());
    }
    attr.state().slot = Slot::Set(value.clone());
    if self.always_self_notify {
      self.invoke(name, value).await;
    }
    Ok(())
  }

  fn set_debug(&self, value: Option<&Value>) {
    let on = value.map(Value::is_truthy).unwrap_or(false);
    self.debug.store(on, Ordering::Relaxed);
  }

  /// Queues `value` on `name` and waits until the node has handled it.
  pub(crate) async fn enqueue(&self, name: &str, value: Option<Value>) -> Result<()> {
    let attr = self.attribute(name)?;
    let tx = attr.sender()?.clone();
    let (ack, mut handled) = oneshot::channel();
    if tx.send(AttributeJob { value, ack }).await.is_err() {
      trace!(node = %self.name(), attribute = %name, "attribute queue closed, value dropped");
      return Ok(());
    }
    if tokio::time::timeout(self.set_timeout(), &mut handled)
      .await
      .is_err()
    {
      warn!(
        node = %self.name(),
        attribute = %name,
        "attribute handoff is taking unusually long, possible deadlock; still waiting"
      );
      let _ = handled.await;
    }
    Ok(())
  }

  /// Runs on an attribute's queue: filters by lifecycle state, stores, notifies.
  pub(crate) async fn deliver(self: &Arc<Self>, name: &str, value: Option<Value>) {
    if self.is_finalizing() {
      trace!(node = %self.name(), attribute = %name, "node finalizing, value dropped");
      return;
    }
    if self.abort_error().is_some() {
      let unwinding = (name == INPUT || name == ABORT) && value.as_ref().is_none_or(Value::is_error);
      if !unwinding {
        trace!(node = %self.name(), attribute = %name, "node aborted, value discarded");
        return;
      }
    }
    if self.debug.load(Ordering::Relaxed) {
      debug!(node = %self.name(), attribute = %name, value = ?value, "attribute delivery");
    }
    if name == ABORT {
      if let Some(v) = value {
        self.abort(abort_error_from(v)).await;
      }
      return;
    }
    if name == DEBUG {
      self.set_debug(value.as_ref());
    }
    let Ok(attr) = self.attribute(name) else {
      return;
    };
    let deferred = {
      let mut state = attr.state();
      state.slot = Slot::Set(value.clone());
      state.flags.deferred
    };
    if self.is_active() || (self.always_self_notify && !deferred) {
      self.invoke(name, value).await;
    }
  }

  /// Hands a value to the transform with the body locked. A hook error aborts the node.
  pub(crate) async fn invoke(self: &Arc<Self>, name: &str, value: Option<Value>) {
    let ctx = NodeContext::new(Arc::clone(self));
    let result = {
      let mut body = self.lock_body().await;
      match body.validate_attribute(name, value.as_ref()) {
        Err(e) => Err(e),
        Ok(()) => {
          let forward_error =
            name == INPUT && !self.handles_errors_directly && value.as_ref().is_some_and(Value::is_error);
          if forward_error {
            self.forward_error(value).await
          } else {
            body.attribute_changed(&ctx, name, value).await
          }
        }
      }
    };
    if let Err(e) = result {
      self.abort(e).await;
    }
    self.run_pending_finalize().await;
  }

  /// Errors skip processing and go straight to `OUTPUT`, ending this node.
  async fn forward_error(self: &Arc<Self>, value: Option<Value>) -> Result<()> {
    self.request_finalize();
    if self.attribute(OUTPUT).is_ok() {
      self.send(OUTPUT, value).await?;
    }
    Ok(())
  }

  /// Stores `value` on `name` and propagates it. A terminal value on a
  /// required output marks the node as finished.
  pub(crate) async fn send(self: &Arc<Self>, name: &str, value: Option<Value>) -> Result<()> {
    let attr = self.attribute(name)?;
    let is_output = {
      let mut state = attr.state();
      state.slot = Slot::Set(value.clone());
      state.flags.requires_outbound_connection
    };
    let terminal = value.as_ref().is_none_or(Value::is_error);
    self.propagate(name, value).await?;
    if is_output && terminal {
      self.request_finalize();
    }
    Ok(())
  }

  /// Sends `value` to every connected attribute, in connection order. Targets
  /// that have not activated yet get it through their activation queue.
  pub(crate) async fn propagate(self: &Arc<Self>, name: &str, value: Option<Value>) -> Result<()> {
    let connections = self.attribute(name)?.state().connections.clone();
    if connections.is_empty() {
      return Ok(());
    }
    let Some(group) = self.group() else {
      return Ok(());
    };
    for c in connections {
      let Some(target) = group.member(c.node) else {
        warn!(node = %self.name(), attribute = %name, target = %c.node, "connection target left the group");
        continue;
      };
      let target = target.inner;
      if target.is_active() {
        target.enqueue(&c.attribute, value.clone()).await?;
      } else {
        trace!(node = %self.name(), target = %target.name(), "target not active, deferring value");
        let weak = Arc::downgrade(&target);
        let attribute = c.attribute.clone();
        let v = value.clone();
        target.activation.schedule(async move {
          if let Some(t) = weak.upgrade()
            && let Err(e) = t.enqueue(&attribute, v).await
          {
            warn!(node = %t.name(), error = %e, "deferred delivery failed");
          }
        });
      }
    }
    Ok(())
  }

  // ---- pushback ----

  #[instrument(level = "trace", skip(self, value), fields(node = %self.name()))]
  pub(crate) fn pushback(self: &Arc<Self>, name: &str, value: Option<Value>) -> Result<()> {
    let attr = self.attribute(name)?;
    {
      let mut state = attr.state();
      if !state.pushback_state.accepts_pushback() {
        let current = state.pushback_state;
        drop(state);
        let e = TransformError::invalid_operation(format!(
          "cannot push back on '{}' of '{}' while it is {}",
          name,
          self.name(),
          current
        ));
        let node = Arc::clone(self);
        let err = e.clone();
        tokio::spawn(async move {
          node.abort(err).await;
        });
        return Err(e);
      }
      let again_null = value.is_none()
        && state.pushback_value.is_none()
        && state.pushback_state == PushbackState::Repush;
      state.pushback_state = if again_null {
        PushbackState::PresentedOnce
      } else {
        PushbackState::Value
      };
      state.pushback_value = value;
    }
    attr.suspend();
    lock(&self.pushbacks).pending.insert(name.to_string());
    Ok(())
  }

  pub(crate) fn has_pending_pushbacks(&self) -> bool {
    !lock(&self.pushbacks).pending.is_empty()
  }

  pub(crate) fn schedule_pushback_retry(self: &Arc<Self>, changed: Option<String>) {
    let node = Arc::clone(self);
    tokio::spawn(async move { node.try_pushbacks(changed).await });
  }

  /// Redelivers every held-back value. `changed` names the attribute whose
  /// delivery triggered the pass; it is not retried against itself.
  pub(crate) async fn try_pushbacks(self: Arc<Self>, changed: Option<String>) {
    {
      let mut set = lock(&self.pushbacks);
      if set.processing {
        set.rerun = true;
        return;
      }
      set.processing = true;
    }
    let mut changed = changed;
    let mut retry_pass = false;
    loop {
      let pending: Vec<String> = std::mem::take(&mut lock(&self.pushbacks).pending)
        .into_iter()
        .collect();
      let mut succeeded = 0usize;
      for name in pending {
        let Ok(attr) = self.attribute(&name) else {
          continue;
        };
        let value = {
          let mut state = attr.state();
          if state.pushback_state == PushbackState::Discard {
            state.pushback_state = PushbackState::Empty;
            state.pushback_value = None;
            drop(state);
            attr.resume();
            succeeded += 1;
            continue;
          }
          let skip = changed.as_deref() == Some(name.as_str())
            || (retry_pass && state.pushback_state == PushbackState::PresentedOnce);
          if skip {
            drop(state);
            lock(&self.pushbacks).pending.insert(name);
            continue;
          }
          state.pushback_state = PushbackState::Repush;
          state.pushback_value.take()
        };
        self.deliver(&name, value).await;
        let resumed = {
          let mut state = attr.state();
          if state.pushback_state == PushbackState::Repush {
            state.pushback_state = PushbackState::Empty;
            true
          } else {
            false
          }
        };
        if resumed {
          attr.resume();
          succeeded += 1;
        }
      }
      let (again, rerun) = {
        let mut set = lock(&self.pushbacks);
        let rerun = std::mem::take(&mut set.rerun);
        let again = rerun || (succeeded > 0 && !set.pending.is_empty());
        if !again {
          set.processing = false;
        }
        (again, rerun)
      };
      if !again {
        break;
      }
      trace!(node = %self.name(), rerun, "pushback retry pass again");
      retry_pass = !rerun;
      changed = None;
    }
  }

  // ---- abort ----

  /// First abort wins; later calls are logged and dropped. Returns whether this call won.
  pub(crate) fn abort(self: &Arc<Self>, error: TransformError) -> BoxFuture<'static, bool> {
    let node = Arc::clone(self);
    Box::pin(async move {
      let name = node.name();
      let error = error.with_origin(&name);
      if node.abort_error.set(error.clone()).is_err() {
        debug!(node = %name, error = %error, "node already aborted, ignoring");
        return false;
      }
      warn!(node = %name, error = %error, "node aborting");
      if !node.is_active() {
        let weak = Arc::downgrade(&node);
        node.activation.schedule(async move {
          if let Some(n) = weak.upgrade() {
            n.run_abort().await;
          }
        });
        return true;
      }
      node.run_abort().await;
      true
    })
  }

  /// Abort received from the group broadcast: never rebroadcast.
  pub(crate) async fn abort_from_group(self: &Arc<Self>, error: TransformError) {
    self.told_group_about_abort.store(true, Ordering::Release);
    self.abort(error).await;
  }

  fn run_abort(self: &Arc<Self>) -> BoxFuture<'static, ()> {
    let node = Arc::clone(self);
    Box::pin(async move {
      let Some(error) = node.abort_error().cloned() else {
        return;
      };
      if !node.told_group_about_abort.swap(true, Ordering::AcqRel)
        && let Some(group) = node.group()
      {
        group.broadcast_abort(node.id, error.clone());
      }
      if !node.is_finalizing() {
        if node.attribute(INPUT).is_ok() {
          node.invoke(INPUT, Some(Value::Error(error))).await;
        } else {
          let _ = node.forward_error(Some(Value::Error(error))).await;
        }
      }
      node.discard_pushbacks();
      Arc::clone(&node).try_pushbacks(None).await;
      node.request_finalize();
      node.run_pending_finalize().await;
    })
  }

  fn discard_pushbacks(&self) {
    let pending: Vec<String> = lock(&self.pushbacks).pending.iter().cloned().collect();
    for name in pending {
      if let Ok(attr) = self.attribute(&name) {
        attr.state().pushback_state = PushbackState::Discard;
      }
    }
  }

  // ---- finalize ----

  pub(crate) fn request_finalize(&self) {
    if !self.is_finalizing.swap(true, Ordering::AcqRel) {
      self.finalize_pending.store(true, Ordering::Release);
    }
  }

  /// Runs the finalize hook if finalization was requested since the last call.
  pub(crate) async fn run_pending_finalize(self: &Arc<Self>) {
    if !self.finalize_pending.swap(false, Ordering::AcqRel) {
      return;
    }
    let ctx = NodeContext::new(Arc::clone(self));
    self.lock_body().await.finalize(&ctx).await;
    debug!(node = %self.name(), "node finalized");
    if let Some(group) = self.group() {
      group.child_started_finalization(self.id);
    }
  }

  /// Ends a node once the graph output is complete: held-back values are
  /// dropped, every queue drains into the finalizing filter.
  pub(crate) async fn shutdown(self: &Arc<Self>) {
    self.request_finalize();
    let held: Vec<String> = std::mem::take(&mut lock(&self.pushbacks).pending)
      .into_iter()
      .collect();
    if !held.is_empty() {
      debug!(node = %self.name(), held = held.len(), "dropping held-back values");
    }
    for attr in self.attributes() {
      {
        let mut state = attr.state();
        state.pushback_state = PushbackState::Empty;
        state.pushback_value = None;
      }
      attr.resume();
    }
    self.run_pending_finalize().await;
  }

  // ---- activation ----

  /// Phase 1: required attributes present, transform agrees, at most one dangling output.
  pub(crate) async fn validate_for_execution(self: &Arc<Self>) -> Result<Option<String>> {
    let mut missing = Vec::new();
    let mut dangling = Vec::new();
    for attr in self.attributes() {
      let state = attr.state();
      if state.flags.required && matches!(state.slot, Slot::Unset) && !state.has_incoming_connection {
        missing.push(attr.name().to_string());
      }
      if state.flags.requires_outbound_connection && state.connections.is_empty() {
        dangling.push(attr.name().to_string());
      }
    }
    if !missing.is_empty() {
      return Err(TransformError::missing_required(&self.name(), &missing));
    }
    let ctx = NodeContext::new(Arc::clone(self));
    self.lock_body().await.can_execute(&ctx)?;
    if dangling.len() > 1 {
      return Err(TransformError::new(
        ErrorKind::MultipleOutputs,
        format!(
          "node '{}' has more than one unconnected output: {}",
          self.name(),
          dangling.join(", ")
        ),
      ));
    }
    Ok(dangling.pop())
  }

  /// Phase 3: start queues, go active, run the setup hook, drain the activation queue.
  pub(crate) async fn activate(self: &Arc<Self>, config: Arc<EngineConfig>) {
    let capacity = config.queue_capacity;
    let _ = self.config.set(config);
    for attr in self.attributes() {
      attr.start_queue(Arc::downgrade(self), capacity);
    }
    self.is_active.store(true, Ordering::Release);
    let ctx = NodeContext::new(Arc::clone(self));
    let started = self.lock_body().await.starting_execution(&ctx).await;
    if let Err(e) = started {
      self.abort(e).await;
    }
    self.run_pending_finalize().await;
    self.activation.resume().await;
    trace!(node = %self.name(), "node active");
  }

  /// Sends values stored before activation along their connections.
  pub(crate) async fn initialize(self: &Arc<Self>) {
    for attr in self.attributes() {
      let stored = {
        let state = attr.state();
        match (&state.slot, state.connections.is_empty()) {
          (Slot::Set(v), false) => Some(v.clone()),
          _ => None,
        }
      };
      if let Some(v) = stored
        && let Err(e) = self.propagate(attr.name(), v).await
      {
        self.abort(e).await;
      }
    }
  }

  /// Starts every source parked on an attribute.
  pub(crate) fn activate_inputs(self: &Arc<Self>) {
    for attr in self.attributes() {
      let source = {
        let mut state = attr.state();
        match std::mem::replace(&mut state.slot, Slot::Unset) {
          Slot::Source(s) => Some(s),
          other => {
            state.slot = other;
            None
          }
        }
      };
      if let Some(source) = source {
        let destination = Destination::new(Arc::downgrade(self), attr.name());
        trace!(node = %self.name(), attribute = %attr.name(), "activating source");
        tokio::spawn(source.run(destination));
      }
    }
  }
}

fn abort_error_from(value: Value) -> TransformError {
  match value {
    Value::Error(e) => e,
    other => TransformError::aborted(format!("abort requested with {:?}", other)),
  }
}
