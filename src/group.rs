//! GroupTransform: the connected component that owns a graph's members and
//! its collective lifecycle.
//!
//! Members are kept sorted by [NodeId] so membership checks are a binary
//! search and repeated connects are idempotent. A group and its members
//! reference each other; the cycle is broken by [GroupTransform::teardown]
//! once an execution has drained, or by [GroupTransform::dispose] for a graph
//! that is never executed.

use crate::attribute::Connection;
use crate::config::EngineConfig;
use crate::error::{ErrorKind, Result, TransformError};
use crate::node::{Node, NodeId};
use crate::sync::{lock, read, write};
use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, trace};

struct GroupInner {
  id: uuid::Uuid,
  name: RwLock<String>,
  config: Arc<EngineConfig>,
  members: RwLock<Vec<Node>>,
  executing: AtomicBool,
  /// Members that have not started finalizing yet.
  children: Mutex<BTreeSet<NodeId>>,
  startup_done: watch::Sender<bool>,
  children_done: watch::Sender<bool>,
  torn_down: watch::Sender<bool>,
}

/// Container of a connected set of nodes.
#[derive(Clone)]
pub struct GroupTransform {
  inner: Arc<GroupInner>,
}

impl PartialEq for GroupTransform {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }
}

impl Eq for GroupTransform {}

impl fmt::Debug for GroupTransform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GroupTransform")
      .field("id", &self.inner.id)
      .field("name", &self.name())
      .field("members", &self.len())
      .field("executing", &self.is_executing())
      .finish()
  }
}

impl Default for GroupTransform {
  fn default() -> Self {
    Self::new()
  }
}

impl GroupTransform {
  pub fn new() -> Self {
    Self::build(EngineConfig::default())
  }

  /// A group whose members run with `config`. Zero capacities are rejected.
  pub fn with_config(config: EngineConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self::build(config))
  }

  fn build(config: EngineConfig) -> Self {
    let id = uuid::Uuid::new_v4();
    let (startup_done, _) = watch::channel(false);
    let (children_done, _) = watch::channel(false);
    let (torn_down, _) = watch::channel(false);
    Self {
      inner: Arc::new(GroupInner {
        id,
        name: RwLock::new(format!("group_{}", &id.simple().to_string()[..8])),
        config: Arc::new(config),
        members: RwLock::new(Vec::new()),
        executing: AtomicBool::new(false),
        children: Mutex::new(BTreeSet::new()),
        startup_done,
        children_done,
        torn_down,
      }),
    }
  }

  pub fn id(&self) -> uuid::Uuid {
    self.inner.id
  }

  pub fn name(&self) -> String {
    read(&self.inner.name).clone()
  }

  pub fn set_name(&self, name: impl Into<String>) {
    *write(&self.inner.name) = name.into();
  }

  pub fn config(&self) -> Arc<EngineConfig> {
    Arc::clone(&self.inner.config)
  }

  pub fn is_executing(&self) -> bool {
    self.inner.executing.load(Ordering::Acquire)
  }

  pub fn len(&self) -> usize {
    read(&self.inner.members).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Members in id order.
  pub fn members(&self) -> Vec<Node> {
    read(&self.inner.members).clone()
  }

  pub fn member(&self, id: NodeId) -> Option<Node> {
    let members = read(&self.inner.members);
    members
      .binary_search_by_key(&id, Node::id)
      .ok()
      .map(|i| members[i].clone())
  }

  pub fn contains(&self, node: &Node) -> bool {
    self.member(node.id()).is_some()
  }

  pub fn node_by_name(&self, name: &str) -> Option<Node> {
    read(&self.inner.members)
      .iter()
      .find(|n| n.name() == name)
      .cloned()
  }

  /// Adds `node` to this group. Adding a member twice is a no-op; a node
  /// that belongs to another group is rejected.
  pub fn add_member(&self, node: &Node) -> Result<()> {
    if let Some(current) = node.group() {
      if current == *self {
        return Ok(());
      }
      return Err(TransformError::invalid_connection(format!(
        "node '{}' already belongs to group '{}'",
        node.name(),
        current.name()
      )));
    }
    self.insert(node);
    Ok(())
  }

  fn insert(&self, node: &Node) {
    {
      let mut members = write(&self.inner.members);
      if let Err(i) = members.binary_search_by_key(&node.id(), Node::id) {
        members.insert(i, node.clone());
      }
    }
    node.inner.set_group(Some(self.clone()));
    trace!(group = %self.inner.id, node = %node.name(), "member added");
  }

  /// Removes an unconnected member while the group is idle.
  pub fn remove_member(&self, node: &Node) -> Result<()> {
    self.ensure_idle()?;
    let connected = node.inner.attributes().iter().any(|a| {
      let s = a.state();
      !s.connections.is_empty() || s.has_incoming_connection
    });
    if connected {
      return Err(TransformError::invalid_operation(format!(
        "node '{}' is still connected",
        node.name()
      )));
    }
    self.remove(node);
    Ok(())
  }

  pub(crate) fn remove(&self, node: &Node) {
    let removed = {
      let mut members = write(&self.inner.members);
      match members.binary_search_by_key(&node.id(), Node::id) {
        Ok(i) => {
          members.remove(i);
          true
        }
        Err(_) => false,
      }
    };
    if removed {
      node.inner.set_group(None);
    }
  }

  fn ensure_idle(&self) -> Result<()> {
    if self.is_executing() {
      return Err(TransformError::new(
        ErrorKind::AlreadyExecuting,
        format!("group '{}' is executing", self.name()),
      ));
    }
    Ok(())
  }

  /// Connects `from.from_attr` to `to.to_attr` inside this group.
  pub fn connect(&self, from: &Node, from_attr: &str, to: &Node, to_attr: &str) -> Result<()> {
    connect_in(Some(self), from, from_attr, to, to_attr, false).map(|_| ())
  }

  /// Attaches the monitor while the group is starting.
  pub(crate) fn attach_output(&self, from: &Node, from_attr: &str, monitor: &Node, to_attr: &str) -> Result<()> {
    connect_in(Some(self), from, from_attr, monitor, to_attr, true).map(|_| ())
  }

  /// Removes the edge `from.from_attr -> to.to_attr`.
  #[instrument(level = "trace", skip(self, from, to), fields(from = %from.name(), to = %to.name()))]
  pub fn disconnect(&self, from: &Node, from_attr: &str, to: &Node, to_attr: &str) -> Result<()> {
    self.ensure_idle()?;
    let src = from.inner.attribute(from_attr)?;
    let dst = to.inner.attribute(to_attr)?;
    let target = Connection {
      node: to.id(),
      attribute: to_attr.to_string(),
    };
    {
      let mut state = src.state();
      let before = state.connections.len();
      state.connections.retain(|c| *c != target);
      if state.connections.len() == before {
        return Err(TransformError::invalid_connection(format!(
          "'{}.{}' is not connected to '{}.{}'",
          from.name(),
          from_attr,
          to.name(),
          to_attr
        )));
      }
    }
    dst.state().has_incoming_connection = false;
    Ok(())
  }

  /// Runs `op` for every member. Parallel runs spawn one task per member;
  /// the first error is kept and returned once everything scheduled is done.
  /// With `stop_on_error`, members not yet started are skipped after a failure.
  pub async fn for_all_nodes<F, Fut>(&self, parallel: bool, stop_on_error: bool, op: F) -> Result<()>
  where
    F: Fn(Node) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let first_error: Arc<OnceCell<TransformError>> = Arc::new(OnceCell::new());
    let members = self.members();
    if parallel {
      let op = Arc::new(op);
      let mut tasks = JoinSet::new();
      for node in members {
        let op = Arc::clone(&op);
        let first_error = Arc::clone(&first_error);
        tasks.spawn(async move {
          if stop_on_error && first_error.get().is_some() {
            return;
          }
          if let Err(e) = op(node).await {
            let _ = first_error.set(e);
          }
        });
      }
      while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
          let _ = first_error.set(TransformError::internal(format!("node task failed: {e}")));
        }
      }
    } else {
      for node in members {
        if let Err(e) = op(node).await {
          let _ = first_error.set(e);
          if stop_on_error {
            break;
          }
        }
      }
    }
    match Arc::try_unwrap(first_error) {
      Ok(cell) => cell.into_inner().map_or(Ok(()), Err),
      Err(shared) => shared.get().cloned().map_or(Ok(()), Err),
    }
  }

  /// Tells every other member to abort. Fire and forget; completion is only logged.
  pub(crate) fn broadcast_abort(&self, origin: NodeId, error: TransformError) {
    let targets: Vec<Node> = self
      .members()
      .into_iter()
      .filter(|n| n.id() != origin)
      .collect();
    let group = self.inner.id;
    debug!(group = %group, error = %error, targets = targets.len(), "broadcasting abort");
    tokio::spawn(async move {
      let mut tasks = JoinSet::new();
      for node in targets {
        let error = error.clone();
        tasks.spawn(async move { node.inner.abort_from_group(error).await });
      }
      while tasks.join_next().await.is_some() {}
      trace!(group = %group, "abort broadcast complete");
    });
  }

  // ---- execution lifecycle ----

  /// Marks the group as executing. False when it already was.
  pub(crate) fn begin_execution(&self) -> bool {
    !self.inner.executing.swap(true, Ordering::AcqRel)
  }

  pub(crate) fn cancel_execution(&self) {
    self.inner.executing.store(false, Ordering::Release);
  }

  pub(crate) fn register_children(&self) {
    let ids: BTreeSet<NodeId> = read(&self.inner.members).iter().map(Node::id).collect();
    *lock(&self.inner.children) = ids;
  }

  pub(crate) fn child_started_finalization(&self, id: NodeId) {
    let remaining = {
      let mut children = lock(&self.inner.children);
      if !children.remove(&id) {
        return;
      }
      children.len()
    };
    trace!(group = %self.inner.id, child = %id, remaining, "child finalizing");
    if remaining == 0 {
      self.inner.children_done.send_replace(true);
    }
  }

  pub(crate) fn mark_startup_done(&self) {
    self.inner.startup_done.send_replace(true);
  }

  pub(crate) async fn wait_startup(&self) {
    let _ = self.inner.startup_done.subscribe().wait_for(|d| *d).await;
  }

  pub(crate) async fn wait_children(&self) {
    let _ = self.inner.children_done.subscribe().wait_for(|d| *d).await;
  }

  /// Resolves once the group has released its members.
  pub async fn wait_torn_down(&self) {
    let _ = self.inner.torn_down.subscribe().wait_for(|d| *d).await;
  }

  pub fn is_torn_down(&self) -> bool {
    *self.inner.torn_down.borrow()
  }

  /// Releases every member and detaches them from the group.
  pub(crate) fn teardown(&self) {
    let members = std::mem::take(&mut *write(&self.inner.members));
    for node in &members {
      node.inner.set_group(None);
    }
    self.inner.torn_down.send_replace(true);
    info!(group = %self.inner.id, members = members.len(), "group torn down");
  }

  /// Dismantles a graph that will not be executed.
  pub fn dispose(&self) -> Result<()> {
    self.ensure_idle()?;
    self.teardown();
    Ok(())
  }
}

/// Connects two nodes, creating or extending their group. Returns the group
/// both nodes belong to afterwards.
pub fn connect(from: &Node, from_attr: &str, to: &Node, to_attr: &str) -> Result<GroupTransform> {
  connect_in(None, from, from_attr, to, to_attr, false)
}

#[instrument(level = "trace", skip(explicit, from, to), fields(from = %from.name(), to = %to.name()))]
fn connect_in(
  explicit: Option<&GroupTransform>,
  from: &Node,
  from_attr: &str,
  to: &Node,
  to_attr: &str,
  starting: bool,
) -> Result<GroupTransform> {
  let src = from.inner.attribute(from_attr)?;
  let dst = to.inner.attribute(to_attr)?;
  if from == to && from_attr == to_attr {
    return Err(TransformError::invalid_connection(format!(
      "cannot connect '{}.{}' to itself",
      from.name(),
      from_attr
    )));
  }
  if from.is_active() || to.is_active() {
    return Err(TransformError::invalid_connection(
      "cannot connect nodes that are already executing",
    ));
  }
  let edge = Connection {
    node: to.id(),
    attribute: to_attr.to_string(),
  };
  let already = src.state().connections.contains(&edge);
  if !already && dst.state().has_incoming_connection {
    return Err(TransformError::invalid_connection(format!(
      "'{}.{}' already has an incoming connection",
      to.name(),
      to_attr
    )));
  }

  let candidates = [explicit.cloned(), from.group(), to.group()];
  let mut groups: Vec<GroupTransform> = Vec::new();
  for g in candidates.into_iter().flatten() {
    if !groups.contains(&g) {
      groups.push(g);
    }
  }
  // A single-member idle group is trivial and gets absorbed.
  let (trivial, real): (Vec<_>, Vec<_>) = groups
    .into_iter()
    .partition(|g| g.len() <= 1 && !g.is_executing() && Some(g) != explicit);
  if real.len() > 1 {
    return Err(TransformError::invalid_connection(format!(
      "'{}' and '{}' belong to different groups",
      from.name(),
      to.name()
    )));
  }
  let group = real
    .into_iter()
    .next()
    .or_else(|| trivial.first().cloned())
    .unwrap_or_default();
  if !starting {
    group.ensure_idle()?;
  }

  for g in trivial.iter().filter(|g| **g != group) {
    for member in g.members() {
      g.remove(&member);
    }
  }
  group.insert(from);
  group.insert(to);
  if !already {
    src.state().connections.push(edge);
    dst.state().has_incoming_connection = true;
  }
  trace!(
    group = %group.inner.id,
    from_attr = %from_attr,
    to_attr = %to_attr,
    "connected"
  );
  Ok(group)
}
