//! Background task driving the reconciler.
//!
//! Writers hand keys to the task through a bounded channel and never wait on
//! it. A full channel drops the hint; the periodic pass picks the entry up
//! from the queue ledger anyway.

use super::Reconciler;
use crate::models::QueueKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Cloneable sender side handed to the write path.
#[derive(Debug, Clone)]
pub struct ReconcileNotifier {
    sender: mpsc::Sender<QueueKey>,
}

impl ReconcileNotifier {
    /// Ask for `key` to be reconciled soon. Never blocks.
    ///
    /// Returns `false` if the hint was dropped.
    pub fn notify(&self, key: QueueKey) -> bool {
        match self.sender.try_send(key) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(key)) => {
                tracing::debug!(doc_id = %key, "Reconciler channel full; relying on periodic pass");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Owns the background reconciler task.
pub struct ReconcilerHandle {
    notifier: ReconcileNotifier,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(reconciler: Arc<Reconciler>, interval: Duration, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<QueueKey>(capacity.max(1));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    Some(key) = receiver.recv() => {
                        if let Err(e) = reconciler.reconcile_key(&key).await {
                            tracing::warn!(doc_id = %key, error = %e, "Notified reconcile failed");
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = reconciler.pass().await {
                            tracing::warn!(error = %e, "Periodic reconciler pass failed");
                        }
                    }
                }
            }
            tracing::info!("Reconciler stopped");
        });

        Self {
            notifier: ReconcileNotifier { sender },
            shutdown,
            task,
        }
    }

    pub fn notifier(&self) -> ReconcileNotifier {
        self.notifier.clone()
    }

    pub fn notify(&self, key: QueueKey) -> bool {
        self.notifier.notify(key)
    }

    /// Stop the worker after its current step and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Reconciler task join error: {}", e);
        }
    }
}
