//! List active sessions on a record

use anyhow::Result;
use coedit_core::resolution::{abbreviate_user_agent, relative_time};
use coedit_core::{CoeditConfig, RecordId, SessionStore};

use super::open_store;
use crate::device;

#[derive(Debug)]
pub struct SessionsOptions {
    pub record: String,
    /// Without an explicit device, sessions are listed as a fresh device sees them
    pub exclude: Option<String>,
    pub json: bool,
}

pub async fn run(config: &CoeditConfig, options: SessionsOptions) -> Result<()> {
    let record = RecordId::parse(options.record)?;
    let exclude = device::resolve(options.exclude.as_deref())?;
    let store = open_store(config).await?;

    let sessions = store
        .list_active_sessions(&record, &exclude, config.stale_threshold())
        .await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No active sessions on {record}");
        return Ok(());
    }

    let now = store.now();
    for session in &sessions {
        println!(
            "{}  {}  {}  last active {}",
            session.id,
            session.device_fingerprint,
            abbreviate_user_agent(&session.user_agent),
            relative_time(session.last_heartbeat, now)
        );
    }
    Ok(())
}
