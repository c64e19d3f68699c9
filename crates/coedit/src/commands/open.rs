//! Hold an edit session open

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use coedit_core::resolution::abbreviate_user_agent;
use coedit_core::{
    CoeditConfig, ConflictNotice, ConflictNotifier, EditScope, RecordId, SessionStore,
};

use super::open_store;
use crate::device;

#[derive(Debug)]
pub struct OpenOptions {
    pub record: String,
    pub device: Option<String>,
    pub user_agent: Option<String>,
    pub for_secs: Option<u64>,
}

/// Prints conflict warnings to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintNotifier;

impl ConflictNotifier for PrintNotifier {
    fn notify(&self, record_id: &RecordId, notice: &ConflictNotice) {
        println!("warning: {} ({record_id})", notice.message());
        for device in &notice.other_devices {
            println!("  - {}", abbreviate_user_agent(&device.user_agent));
        }
    }
}

pub async fn run(config: &CoeditConfig, options: OpenOptions) -> Result<()> {
    let record = RecordId::parse(options.record)?;
    let fingerprint = device::resolve(options.device.as_deref())?;
    let user_agent = options
        .user_agent
        .unwrap_or_else(|| config.user_agent.clone());
    let store: Arc<dyn SessionStore> = Arc::new(open_store(config).await?);

    let scope = EditScope::enter(
        store,
        config,
        record.clone(),
        fingerprint.clone(),
        &user_agent,
        Arc::new(PrintNotifier),
    )
    .await;

    match scope.session_id() {
        Some(id) => println!("Editing {record} as {fingerprint} (session {id})"),
        None => println!("Editing {record} as {fingerprint} without a session"),
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            }
        }
        () = wait_for(options.for_secs) => {}
    }

    scope.exit().await;
    println!("Stopped editing {record}");
    Ok(())
}

async fn wait_for(secs: Option<u64>) {
    match secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => std::future::pending().await,
    }
}
