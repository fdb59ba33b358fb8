//! Periodic re-classification.

use crate::mode::ConnectionStatus;
use crate::repository::Repository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background task re-probing the remote store on a fixed interval.
///
/// Every probe result is published on a watch channel; a probe that finds
/// the remote store reachable again also drains the pending queue.
pub struct StatusMonitor {
    status: watch::Receiver<ConnectionStatus>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Shortest accepted poll interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl StatusMonitor {
    /// Starts polling at the repository's configured interval.
    pub fn start(repository: Arc<Repository>) -> Self {
        let interval = repository.poll_interval();
        Self::spawn(repository, interval)
    }

    /// Starts polling. The first probe runs immediately.
    ///
    /// An interval shorter than one millisecond is raised to one millisecond.
    pub fn spawn(repository: Arc<Repository>, interval: Duration) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let (status_tx, status_rx) = watch::channel(repository.status());
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        match repository.refresh_status().await {
                            Ok(refresh) => {
                                if let Some(report) = &refresh.sync {
                                    tracing::info!(
                                        synced = report.synced_count(),
                                        conflicts = report.conflict_count(),
                                        "reconnected and synced"
                                    );
                                }
                                status_tx.send_replace(refresh.status);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "status refresh failed");
                                status_tx.send_replace(repository.status());
                            }
                        }
                    }
                }
            }
            tracing::debug!("status monitor stopped");
        });

        Self {
            status: status_rx,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// A receiver of every published status.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The most recently published status.
    pub fn latest(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Stops polling and waits for the task to exit.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "status monitor task failed");
            }
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
