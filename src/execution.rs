//! Execution: the three-phase start of a group plus the delivery side the
//! caller observes.
//!
//! 1. validate every member in parallel and find the single dangling output;
//! 2. attach the monitor to that output;
//! 3. activate every member in parallel, then initialize and start sources.
//!
//! A failure in phase 1 or 2 returns before any node has started. Once phase 3
//! has begun, failures travel as aborts and end up at the monitor.

use crate::error::{ErrorKind, Result, TransformError};
use crate::group::GroupTransform;
use crate::monitor::Monitor;
use crate::node::Node;
use crate::sync::lock;
use crate::types::{Delivery, INPUT, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, instrument, trace, warn};

/// A running execution started with a delivery callback.
pub struct ExecutionHandle {
  group: GroupTransform,
  done: oneshot::Receiver<()>,
}

impl ExecutionHandle {
  pub fn group(&self) -> &GroupTransform {
    &self.group
  }

  /// Resolves after the callback has received the final delivery.
  pub async fn wait(self) {
    let _ = self.done.await;
  }
}

/// Runs `group` and returns the last data value, or the error that ended it.
pub async fn execute(group: &GroupTransform) -> Result<Option<Value>> {
  let (sink, mut deliveries) = mpsc::unbounded_channel();
  start(group, sink).await?;
  let mut last = None;
  while let Some(d) = deliveries.recv().await {
    if let Some(v) = d.value
      && !v.is_error()
    {
      last = Some(v);
    }
    if d.is_final {
      return match d.error {
        Some(e) => Err(e),
        None => Ok(last),
      };
    }
  }
  Err(ended_without_final())
}

/// Runs `group`, calling `callback` for every delivery on a dedicated task.
pub async fn execute_with<F>(group: &GroupTransform, mut callback: F) -> Result<ExecutionHandle>
where
  F: FnMut(Delivery) + Send + 'static,
{
  let (sink, mut deliveries) = mpsc::unbounded_channel();
  start(group, sink).await?;
  let (done_tx, done) = oneshot::channel();
  tokio::spawn(async move {
    let mut finished = false;
    while let Some(d) = deliveries.recv().await {
      let last = d.is_final;
      callback(d);
      if last {
        finished = true;
        break;
      }
    }
    if !finished {
      callback(Delivery::failed(ended_without_final()));
    }
    let _ = done_tx.send(());
  });
  Ok(ExecutionHandle {
    group: group.clone(),
    done,
  })
}

fn ended_without_final() -> TransformError {
  TransformError::internal("graph ended without a final delivery")
}

#[instrument(level = "trace", skip_all, fields(group = %group.id()))]
async fn start(group: &GroupTransform, sink: mpsc::UnboundedSender<Delivery>) -> Result<()> {
  if !group.begin_execution() || group.members().iter().any(Node::is_active) {
    return Err(TransformError::new(
      ErrorKind::AlreadyExecuting,
      format!("group '{}' is already executing", group.name()),
    ));
  }
  let (finished_tx, finished) = oneshot::channel();
  if let Err(e) = prepare(group, sink, finished_tx).await {
    group.cancel_execution();
    return Err(e);
  }
  group.register_children();

  let config = group.config();
  group
    .for_all_nodes(true, false, move |node| {
      let config = Arc::clone(&config);
      async move {
        node.inner.activate(config).await;
        Ok(())
      }
    })
    .await?;
  trace!(group = %group.id(), "phase 3 complete");

  group
    .for_all_nodes(true, false, |node| async move {
      node.inner.initialize().await;
      Ok(())
    })
    .await?;
  for node in group.members() {
    node.inner.activate_inputs();
  }
  group.mark_startup_done();
  info!(group = %group.id(), members = group.len(), "execution started");

  tokio::spawn(run_lifecycle(group.clone(), finished));
  Ok(())
}

/// Phases 1 and 2. Nothing started yet, so an error leaves the graph as it was
/// apart from the monitor, which is removed again.
async fn prepare(
  group: &GroupTransform,
  sink: mpsc::UnboundedSender<Delivery>,
  finished: oneshot::Sender<()>,
) -> Result<()> {
  let dangling: Arc<Mutex<Vec<(Node, String)>>> = Arc::new(Mutex::new(Vec::new()));
  let found = Arc::clone(&dangling);
  group
    .for_all_nodes(true, false, move |node| {
      let found = Arc::clone(&found);
      async move {
        let output = node.inner.validate_for_execution().await?;
        if let Some(attr) = output {
          lock(&found).push((node, attr));
        }
        Ok(())
      }
    })
    .await?;
  trace!(group = %group.id(), "phase 1 complete");

  let mut dangling = std::mem::take(&mut *lock(&dangling));
  if dangling.len() > 1 {
    let names: Vec<String> = dangling
      .iter()
      .map(|(n, a)| format!("{}.{}", n.name(), a))
      .collect();
    return Err(TransformError::new(
      ErrorKind::MultipleOutputs,
      format!("graph has more than one unconnected output: {}", names.join(", ")),
    ));
  }
  let Some((output, attr)) = dangling.pop() else {
    return Err(TransformError::new(
      ErrorKind::NoOutput,
      format!("group '{}' has no unconnected output", group.name()),
    ));
  };

  let monitor = Node::new(Monitor::new(sink, finished));
  monitor.set_name(format!("monitor_{}", output.name()));
  group.add_member(&monitor)?;
  if let Err(e) = group.attach_output(&output, &attr, &monitor, INPUT) {
    warn!(group = %group.id(), error = %e, "could not attach monitor");
    group.remove(&monitor);
    return Err(e);
  }
  trace!(group = %group.id(), output = %output.name(), attribute = %attr, "phase 2 complete");
  Ok(())
}

/// Startup scope, then children scope, then teardown.
async fn run_lifecycle(group: GroupTransform, finished: oneshot::Receiver<()>) {
  group.wait_startup().await;
  let _ = finished.await;
  let _ = group
    .for_all_nodes(true, false, |node| async move {
      node.inner.shutdown().await;
      Ok(())
    })
    .await;
  group.wait_children().await;
  group.teardown();
}
