//! Attribute: a named slot on a node with its connection list, its serial
//! queue and its pushback state.
//!
//! The queue is a bounded tokio channel drained by one task per attribute.
//! Suspension is an explicit `watch` flag the task waits on before it polls
//! the channel again, so a pushback stalls exactly one attribute.

use crate::error::{Result, TransformError};
use crate::node::{NodeId, NodeInner};
use crate::source::Source;
use crate::sync::lock;
use crate::types::{AttributeFlags, AttributeSpec, AttributeValue, PushbackState, Value};
use once_cell::sync::OnceCell;
use std::sync::{Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::trace;

/// Outgoing edge: target node (by id, resolved through the group) and attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Connection {
  pub node: NodeId,
  pub attribute: String,
}

/// Stored content of an attribute.
pub(crate) enum Slot {
  Unset,
  Set(Option<Value>),
  /// Held until the owning node activates its inputs.
  Source(Box<dyn Source>),
}

impl Slot {
  pub(crate) fn view(&self) -> AttributeValue {
    match self {
      Slot::Unset => AttributeValue::Unset,
      Slot::Set(None) => AttributeValue::Null,
      Slot::Set(Some(v)) => AttributeValue::Set(v.clone()),
      Slot::Source(_) => AttributeValue::Deferred,
    }
  }
}

pub(crate) struct AttributeState {
  pub flags: AttributeFlags,
  pub slot: Slot,
  pub connections: Vec<Connection>,
  pub has_incoming_connection: bool,
  pub pushback_state: PushbackState,
  pub pushback_value: Option<Value>,
}

/// One queued write plus the handoff the writer waits on.
pub(crate) struct AttributeJob {
  pub value: Option<Value>,
  pub ack: oneshot::Sender<()>,
}

pub(crate) struct Attribute {
  name: String,
  state: Mutex<AttributeState>,
  /// Created when the node activates.
  tx: OnceCell<mpsc::Sender<AttributeJob>>,
  suspended: watch::Sender<bool>,
}

impl Attribute {
  pub(crate) fn new(spec: AttributeSpec) -> Self {
    let (suspended, _) = watch::channel(false);
    Self {
      name: spec.name,
      state: Mutex::new(AttributeState {
        flags: spec.flags,
        slot: Slot::Unset,
        connections: Vec::new(),
        has_incoming_connection: false,
        pushback_state: PushbackState::Empty,
        pushback_value: None,
      }),
      tx: OnceCell::new(),
      suspended,
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn state(&self) -> MutexGuard<'_, AttributeState> {
    lock(&self.state)
  }

  pub(crate) fn flags(&self) -> AttributeFlags {
    self.state().flags
  }

  pub(crate) fn view(&self) -> AttributeValue {
    self.state().slot.view()
  }

  /// Spawns the queue task. Later calls are ignored.
  pub(crate) fn start_queue(&self, node: Weak<NodeInner>, capacity: usize) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    if self.tx.set(tx).is_err() {
      return;
    }
    let suspended = self.suspended.subscribe();
    tokio::spawn(run_queue(node, self.name.clone(), rx, suspended));
  }

  pub(crate) fn sender(&self) -> Result<&mpsc::Sender<AttributeJob>> {
    self.tx.get().ok_or_else(|| {
      TransformError::internal(format!("queue of attribute '{}' is not running", self.name))
    })
  }

  pub(crate) fn suspend(&self) {
    self.suspended.send_replace(true);
  }

  pub(crate) fn resume(&self) {
    self.suspended.send_replace(false);
  }
}

/// Drains one attribute's queue in send order, pausing while it is suspended.
async fn run_queue(
  node: Weak<NodeInner>,
  attribute: String,
  mut rx: mpsc::Receiver<AttributeJob>,
  mut suspended: watch::Receiver<bool>,
) {
  loop {
    let runnable = suspended.wait_for(|s| !*s).await.is_ok();
    if !runnable {
      break;
    }
    let Some(job) = rx.recv().await else {
      break;
    };
    let Some(node) = node.upgrade() else {
      break;
    };
    node.deliver(&attribute, job.value).await;
    let _ = job.ack.send(());
    if node.has_pending_pushbacks() {
      node.schedule_pushback_retry(Some(attribute.clone()));
    }
  }
  trace!(attribute = %attribute, "attribute queue stopped");
}
