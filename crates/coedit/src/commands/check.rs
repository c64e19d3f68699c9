//! One-shot conflict check

use std::sync::Arc;

use anyhow::Result;
use coedit_core::{
    CoeditConfig, ConflictDetector, ConflictNotice, ConflictPrompt, DeviceFingerprint, RecordId,
    SessionStore,
};

use super::open_store;

#[derive(Debug)]
pub struct CheckOptions {
    pub record: String,
    pub device: String,
    pub json: bool,
}

pub async fn run(config: &CoeditConfig, options: CheckOptions) -> Result<()> {
    let record = RecordId::parse(options.record)?;
    let fingerprint = DeviceFingerprint::parse(options.device)?;
    let store: Arc<dyn SessionStore> = Arc::new(open_store(config).await?);

    let info = ConflictDetector::new(
        Arc::clone(&store),
        record.clone(),
        fingerprint,
        config.stale_threshold(),
    )
    .check()
    .await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    if !info.has_conflict {
        println!("No other devices are editing {record}");
        return Ok(());
    }

    let notice = ConflictNotice {
        other_devices: info.other_devices.clone(),
    };
    println!("{}", notice.message());
    for device in ConflictPrompt::from_info(&info, store.now()).devices {
        println!("  - {} (last active {})", device.agent, device.last_active);
    }
    Ok(())
}
