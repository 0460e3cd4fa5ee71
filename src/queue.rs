//! Serial job queue that starts suspended and is resumed exactly once.
//!
//! Every node owns one as its activation queue: work aimed at a node that has
//! not finished starting (deferred propagation, an early abort) is parked here
//! and runs, in scheduling order, once the node activates.

use crate::sync::lock;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

type Job = BoxFuture<'static, ()>;

pub(crate) struct ActivationQueue {
  /// Jobs in scheduling order.
  tx: mpsc::UnboundedSender<Job>,
  /// Taken by the drain task on resume.
  rx: Mutex<Option<mpsc::UnboundedReceiver<Job>>>,
  resumed: AtomicBool,
}

impl ActivationQueue {
  pub(crate) fn new() -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      tx,
      rx: Mutex::new(Some(rx)),
      resumed: AtomicBool::new(false),
    }
  }

  /// Appends a job. Before [Self::resume] it waits; afterwards it runs behind any earlier job.
  pub(crate) fn schedule(&self, job: impl Future<Output = ()> + Send + 'static) {
    if self.tx.send(Box::pin(job)).is_err() {
      trace!("activation queue closed, job dropped");
    }
  }

  #[cfg(test)]
  pub(crate) fn is_resumed(&self) -> bool {
    self.resumed.load(Ordering::Acquire)
  }

  /// Starts draining. Resolves once every job scheduled before the call has run.
  pub(crate) async fn resume(&self) {
    let Some(mut rx) = lock(&self.rx).take() else {
      return;
    };
    self.resumed.store(true, Ordering::Release);
    let (drained_tx, drained_rx) = oneshot::channel();
    self.schedule(async move {
      let _ = drained_tx.send(());
    });
    tokio::spawn(async move {
      while let Some(job) = rx.recv().await {
        job.await;
      }
    });
    let _ = drained_rx.await;
  }
}
