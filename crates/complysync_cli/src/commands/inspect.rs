//! Inspect command implementation.

use complysync_core::{LocalRecord, SyncState};
use complysync_engine::{EngineConfig, Repository};
use complysync_protocol::Collection;
use serde::Serialize;

/// Records of one collection.
#[derive(Debug, Serialize)]
pub struct CollectionListing {
    /// Collection name.
    pub collection: String,
    /// Records in append order.
    pub records: Vec<LocalRecord>,
}

/// Runs the inspect command.
///
/// Reads the local store directly; the remote store is never contacted.
pub fn run(
    config: &EngineConfig,
    collection: Option<&str>,
    pending_only: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !config.data_dir.exists() {
        return Err(format!("No local store found at {:?}", config.data_dir).into());
    }
    let store = Repository::open_local(config)?;

    let collections = match collection {
        Some(name) => vec![Collection::new(name)?],
        None => store.collections()?,
    };

    let mut listings = Vec::with_capacity(collections.len());
    for collection in collections {
        tracing::debug!(%collection, pending_only, "listing records");
        let records = if pending_only {
            store.pending(&collection)?
        } else {
            store.list(&collection)?
        };
        listings.push(CollectionListing {
            collection: collection.to_string(),
            records,
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&listings)?),
        _ => print_text_output(&listings),
    }

    Ok(())
}

fn print_text_output(listings: &[CollectionListing]) {
    if listings.is_empty() {
        println!("No collections");
        return;
    }
    for listing in listings {
        println!("{} ({} records)", listing.collection, listing.records.len());
        for record in &listing.records {
            let marker = match record.sync_state {
                SyncState::Synced => ' ',
                SyncState::Pending => '*',
                SyncState::Conflict => '!',
            };
            println!(
                "  {marker} {}  {:<8}  updated {}",
                record.entity.id, record.sync_state, record.entity.updated_at
            );
        }
    }
}
