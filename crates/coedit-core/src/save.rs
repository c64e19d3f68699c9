//! Save path with conflict gating.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictInfo;
use crate::resolution::{ConflictPrompt, ConflictResolver, SaveDecision};
use crate::session::RecordId;
use crate::{Error, Result};

/// Destination of record writes. Writes are unconditional overwrites.
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Persist `payload` as the new state of `record_id`.
    async fn write(&self, record_id: &RecordId, payload: &serde_json::Value) -> Result<()>;
}

/// Result of a gated save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The write went through.
    Saved {
        /// True when other devices were active and were overwritten
        overwrote: bool,
    },
    /// The user chose to cancel; nothing was written.
    Cancelled {
        /// What the user was shown
        prompt: ConflictPrompt,
    },
}

/// Runs a save, consulting a resolver when other devices are active.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveGate;

impl SaveGate {
    /// Save `payload` to `record_id`.
    ///
    /// With no conflict the write happens directly. With a conflict the
    /// resolver picks between overwriting and cancelling. Write failures
    /// come back as [`Error::SaveFailed`].
    pub async fn save(
        conflict: &ConflictInfo,
        resolver: &dyn ConflictResolver,
        writer: &dyn RecordWriter,
        record_id: &RecordId,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome> {
        if !conflict.has_conflict {
            write(writer, record_id, payload).await?;
            return Ok(SaveOutcome::Saved { overwrote: false });
        }

        let prompt = ConflictPrompt::from_info(conflict, now);
        match resolver.decide(&prompt) {
            SaveDecision::SaveAnyway => {
                // No version check: this silently replaces concurrent edits.
                tracing::warn!(
                    record_id = %record_id,
                    other_devices = conflict.other_devices.len(),
                    "saving over concurrent edit session(s), last writer wins"
                );
                write(writer, record_id, payload).await?;
                Ok(SaveOutcome::Saved { overwrote: true })
            }
            SaveDecision::Cancel => {
                tracing::info!(record_id = %record_id, "save cancelled due to conflict");
                Ok(SaveOutcome::Cancelled { prompt })
            }
        }
    }
}

async fn write(
    writer: &dyn RecordWriter,
    record_id: &RecordId,
    payload: &serde_json::Value,
) -> Result<()> {
    writer.write(record_id, payload).await.map_err(|e| match e {
        Error::SaveFailed(_) => e,
        other => Error::SaveFailed(format!("{record_id}: {other}")),
    })
}
