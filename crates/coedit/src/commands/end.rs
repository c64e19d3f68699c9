//! Mark a session ended

use anyhow::Result;
use coedit_core::{CoeditConfig, SessionId, SessionStore};

use super::open_store;

pub async fn run(config: &CoeditConfig, session_id: &str) -> Result<()> {
    let session_id = SessionId::parse(session_id)?;
    let store = open_store(config).await?;

    store.end_session(&session_id, store.now()).await?;
    tracing::info!(session_id = %session_id, "edit session ended");
    println!("Ended session {session_id}");
    Ok(())
}
