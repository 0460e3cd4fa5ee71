//! The monitor: terminal pseudo-node that hands the graph's output to the caller.

use crate::context::NodeContext;
use crate::error::Result;
use crate::transform::Transform;
use crate::types::{AttributeSpec, Delivery, INPUT, Value};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

pub(crate) const MONITOR_TYPE: &str = "monitor";

/// Forwards every value reaching `INPUT` as a [Delivery]. The first null or
/// error is the terminal delivery; anything after it is ignored.
pub(crate) struct Monitor {
  sink: mpsc::UnboundedSender<Delivery>,
  finished: Option<oneshot::Sender<()>>,
}

impl Monitor {
  pub(crate) fn new(sink: mpsc::UnboundedSender<Delivery>, finished: oneshot::Sender<()>) -> Self {
    Self {
      sink,
      finished: Some(finished),
    }
  }

  fn deliver(&self, delivery: Delivery) {
    if self.sink.send(delivery).is_err() {
      trace!("delivery receiver gone");
    }
  }
}

#[async_trait]
impl Transform for Monitor {
  fn type_name(&self) -> &str {
    MONITOR_TYPE
  }

  fn attributes(&self) -> Vec<AttributeSpec> {
    vec![
      AttributeSpec::new(INPUT)
        .required()
        .stream()
        .transient()
        .mutable_while_running(),
    ]
  }

  fn handles_errors_directly(&self) -> bool {
    true
  }

  async fn attribute_changed(
    &mut self,
    ctx: &NodeContext,
    attribute: &str,
    value: Option<Value>,
  ) -> Result<()> {
    if attribute != INPUT {
      return Ok(());
    }
    let Some(finished) = self.finished.take() else {
      trace!(node = %ctx.name(), "monitor already delivered its final value");
      return Ok(());
    };
    let terminal = match value {
      Some(Value::Error(e)) => Delivery::failed(e),
      None => Delivery::end(),
      Some(v) => {
        self.finished = Some(finished);
        self.deliver(Delivery::data(v));
        return Ok(());
      }
    };
    debug!(node = %ctx.name(), failed = terminal.error.is_some(), "graph output complete");
    self.deliver(terminal);
    ctx.finalize();
    let _ = finished.send(());
    Ok(())
  }
}
