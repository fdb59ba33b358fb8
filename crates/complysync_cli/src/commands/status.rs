//! Status command implementation.

use complysync_engine::{EngineConfig, Mode, Repository};
use serde::Serialize;

/// Status command result.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    /// Local data directory.
    pub data_dir: String,
    /// `production` or `demo`.
    pub mode: Mode,
    /// Label shown to users.
    pub display_mode: String,
    /// Whether the probe succeeded.
    pub is_connected: bool,
    /// Probe failure text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pending writes per collection.
    pub pending: Vec<PendingCount>,
}

/// Pending writes in one collection.
#[derive(Debug, Serialize)]
pub struct PendingCount {
    /// Collection name.
    pub collection: String,
    /// Number of pending records.
    pub count: usize,
}

/// Runs the status command. Probes but never syncs.
pub async fn run(config: &EngineConfig, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::open(config)?;
    let status = repository.probe().await;
    tracing::debug!(connected = status.is_connected, "probe finished");

    let local = repository.local();
    let mut pending = Vec::new();
    for collection in local.collections()? {
        let count = local.pending(&collection)?.len();
        if count > 0 {
            pending.push(PendingCount {
                collection: collection.to_string(),
                count,
            });
        }
    }

    let result = StatusResult {
        data_dir: config.data_dir.display().to_string(),
        mode: status.mode,
        display_mode: status.display_mode().to_string(),
        is_connected: status.is_connected,
        error: status.error,
        pending,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("Data directory: {}", result.data_dir);
    println!("Mode:           {}", result.display_mode);
    println!("Connected:      {}", result.is_connected);
    if let Some(error) = &result.error {
        println!("Probe error:    {error}");
    }
    if result.pending.is_empty() {
        println!("Pending writes: none");
    } else {
        println!("Pending writes:");
        for p in &result.pending {
            println!("  {:<28} {}", p.collection, p.count);
        }
    }
}
