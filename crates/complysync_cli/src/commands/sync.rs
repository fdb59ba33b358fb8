//! Sync command implementation.

use complysync_engine::{EngineConfig, Repository, SyncOutcome, SyncReport};
use serde::Serialize;

/// Sync command result.
#[derive(Debug, Serialize)]
pub struct SyncResult {
    /// Entities the remote store accepted.
    pub synced: usize,
    /// Entities replaced by a newer remote copy.
    pub conflicts: usize,
    /// Entities left pending after a failure.
    pub failures: Vec<FailedEntity>,
    /// Writes still pending after the pass.
    pub pending_after: usize,
    /// Whether the pass stopped early.
    pub cancelled: bool,
}

/// One entity the pass could not push.
#[derive(Debug, Serialize)]
pub struct FailedEntity {
    /// Collection name.
    pub collection: String,
    /// Entity id.
    pub id: String,
    /// Error classification.
    pub kind: String,
    /// Error text.
    pub error: String,
}

impl SyncResult {
    fn from_report(report: &SyncReport, pending_after: usize) -> Self {
        let failures = report
            .outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                SyncOutcome::Failed { kind, error } => Some(FailedEntity {
                    collection: o.collection.to_string(),
                    id: o.id.to_string(),
                    kind: kind.to_string(),
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect();
        Self {
            synced: report.synced_count(),
            conflicts: report.conflict_count(),
            failures,
            pending_after,
            cancelled: report.cancelled,
        }
    }
}

/// Runs the sync command.
pub async fn run(config: &EngineConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(config)?;
    let refresh = repository.refresh_status().await?;

    if !refresh.status.is_connected {
        let reason = refresh
            .status
            .error.clone()
            .unwrap_or_else(|| "no remote store configured".to_string());
        return Err(format!("Cannot sync while {}: {reason}", refresh.status.display_mode()).into());
    }

    // A reconnect already ran a pass.
    let report = match refresh.sync {
        Some(report) => report,
        None => {
            tracing::debug!("remote store already connected; running a pass");
            repository.request_sync().await?
        }
    };
    tracing::info!(
        synced = report.synced_count(),
        failed = report.failed_count(),
        "sync finished"
    );
    let result = SyncResult::from_report(&report, repository.pending_count()?);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &SyncResult) {
    println!("Synced:    {}", result.synced);
    println!("Conflicts: {}", result.conflicts);
    println!("Failed:    {}", result.failures.len());
    for f in &result.failures {
        println!("  {}/{} [{}] {}", f.collection, f.id, f.kind, f.error);
    }
    println!("Pending:   {}", result.pending_after);
    if result.cancelled {
        println!("(pass cancelled)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use complysync_engine::{EntitySyncOutcome, ErrorKind};
    use complysync_protocol::{Collection, EntityId, Timestamp};

    #[test]
    fn summary_lists_failures_only() {
        let c = Collection::profiles();
        let failed = EntityId::new();
        let report = SyncReport {
            outcomes: vec![
                EntitySyncOutcome {
                    collection: c.clone(),
                    id: EntityId::new(),
                    outcome: SyncOutcome::Synced,
                },
                EntitySyncOutcome {
                    collection: c.clone(),
                    id: failed,
                    outcome: SyncOutcome::Failed {
                        kind: ErrorKind::NetworkUnreachable,
                        error: "connection refused".into(),
                    },
                },
            ],
            cancelled: false,
            started_at: Timestamp::from_millis(1),
            finished_at: Timestamp::from_millis(2),
        };

        let result = SyncResult::from_report(&report, 1);
        assert_eq!(result.synced, 1);
        assert_eq!(result.conflicts, 0);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].id, failed.to_string());
        assert_eq!(result.failures[0].kind, "network_unreachable");
        assert_eq!(result.pending_after, 1);
    }
}
