//! Record storage for `coedit save`.
//!
//! Records live next to the session table in the same SQLite file. Saves
//! are plain upserts: the last writer wins.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use coedit_core::{Error, RecordId, RecordWriter, Result};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct SqliteRecordWriter {
    db: SqlitePool,
}

impl SqliteRecordWriter {
    /// Wrap a pool and create the `period_records` table if needed.
    pub async fn new(db: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS period_records (
                record_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )",
        )
        .execute(&db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to create period_records table: {e}")))?;

        Ok(Self { db })
    }

    /// Current stored payload, if the record was ever saved.
    pub async fn load(&self, record_id: &RecordId) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT payload FROM period_records WHERE record_id = ?")
            .bind(record_id.as_str())
            .fetch_optional(&self.db)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to load record {record_id}: {e}")))?;

        row.map(|row| {
            let payload: String = row
                .try_get("payload")
                .map_err(|e| Error::DatabaseError(format!("Failed to read payload: {e}")))?;
            serde_json::from_str(&payload)
                .map_err(|e| Error::ParseError(format!("Stored payload for {record_id}: {e}")))
        })
        .transpose()
    }
}

#[async_trait]
impl RecordWriter for SqliteRecordWriter {
    async fn write(&self, record_id: &RecordId, payload: &serde_json::Value) -> Result<()> {
        let saved_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        sqlx::query(
            "INSERT INTO period_records (record_id, payload, saved_at) VALUES (?, ?, ?)
             ON CONFLICT(record_id) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at",
        )
        .bind(record_id.as_str())
        .bind(payload.to_string())
        .bind(saved_at)
        .execute(&self.db)
        .await
        .map_err(|e| Error::SaveFailed(format!("Failed to write record {record_id}: {e}")))?;
        Ok(())
    }
}
