//! Watch command implementation.

use complysync_engine::{EngineConfig, Repository, StatusMonitor};
use std::sync::Arc;

/// Runs the watch command until interrupted.
///
/// Re-probes at the configured poll interval and prints a line each time the
/// displayed mode changes. A reconnect drains the pending queue.
pub async fn run(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Arc::new(Repository::open(config)?);
    tracing::info!(interval = ?repository.poll_interval(), "watching connection status");

    let monitor = StatusMonitor::start(repository.clone());
    let mut updates = monitor.subscribe();
    let mut shown = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    tracing::warn!("status monitor stopped");
                    break;
                }
                let status = updates.borrow_and_update().clone();
                let mode = status.display_mode();
                if shown != Some(mode) {
                    let pending = repository.pending_count()?;
                    match &status.error {
                        Some(error) => println!("{mode} ({pending} pending): {error}"),
                        None => println!("{mode} ({pending} pending)"),
                    }
                    shown = Some(mode);
                }
            }
        }
    }

    monitor.stop().await;
    Ok(())
}
