//! Gated save

use std::sync::Arc;

use anyhow::Result;
use coedit_core::{
    CoeditConfig, ConflictDetector, DeviceFingerprint, Error, RecordId, SaveDecision, SaveGate,
    SaveOutcome, SessionStore,
};

use super::open_store;
use crate::db::SqliteRecordWriter;
use crate::error::CliError;

#[derive(Debug)]
pub struct SaveOptions {
    pub record: String,
    pub device: String,
    pub payload: String,
    pub force: bool,
}

/// Save a payload, cancelling when other devices are active unless forced.
///
/// # Errors
///
/// [`CliError::SaveCancelled`] when the save was stopped by a conflict;
/// `coedit_core::Error::SaveFailed` when the write itself failed.
pub async fn run(config: &CoeditConfig, options: SaveOptions) -> Result<()> {
    let record = RecordId::parse(options.record)?;
    let fingerprint = DeviceFingerprint::parse(options.device)?;
    let payload: serde_json::Value = serde_json::from_str(&options.payload)
        .map_err(|e| Error::validation("payload", format!("not valid JSON: {e}")))?;

    let sqlite = open_store(config).await?;
    let writer = SqliteRecordWriter::new(sqlite.pool().clone()).await?;
    let store: Arc<dyn SessionStore> = Arc::new(sqlite);

    let conflict = ConflictDetector::new(
        Arc::clone(&store),
        record.clone(),
        fingerprint,
        config.stale_threshold(),
    )
    .check()
    .await?;

    let decision = if options.force {
        SaveDecision::SaveAnyway
    } else {
        SaveDecision::Cancel
    };

    match SaveGate::save(&conflict, &decision, &writer, &record, &payload, store.now()).await? {
        SaveOutcome::Saved { overwrote: false } => println!("Saved {record}"),
        SaveOutcome::Saved { overwrote: true } => println!(
            "Saved {record} (overwrote {} other device(s))",
            conflict.other_devices.len()
        ),
        SaveOutcome::Cancelled { prompt } => {
            println!("{}", prompt.render());
            return Err(CliError::SaveCancelled {
                record_id: record.to_string(),
                devices: prompt.devices.len(),
            }
            .into());
        }
    }
    Ok(())
}
