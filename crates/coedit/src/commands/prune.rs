//! Housekeeping: drop ended and stale sessions

use anyhow::Result;
use chrono::Duration;
use coedit_core::{CoeditConfig, Error, SessionStore};

use super::open_store;

pub async fn run(config: &CoeditConfig, older_than_secs: Option<u64>) -> Result<()> {
    let secs = older_than_secs.unwrap_or(config.stale_threshold_secs);
    let age = i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| Error::validation("older-than", format!("{secs} is too large")))?;

    let store = open_store(config).await?;
    let cutoff = store
        .now()
        .checked_sub_signed(age)
        .ok_or_else(|| Error::validation("older-than", format!("{secs} is too large")))?;
    let removed = store.prune(cutoff, config.stale_threshold()).await?;

    tracing::info!(removed, cutoff = %cutoff, "pruned edit sessions");
    println!("Pruned {removed} session(s)");
    Ok(())
}
