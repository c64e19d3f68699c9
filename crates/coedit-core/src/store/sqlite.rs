//! `SQLite`-backed session store.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so string comparison in SQL orders them correctly.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{open_session_cutoff, SessionStore};
use crate::clock::{SharedClock, SystemClock};
use crate::session::{DeviceFingerprint, EditSession, RecordId, SessionId};
use crate::{Error, Result};

type SessionRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

const SELECT_COLUMNS: &str =
    "id, record_id, device_fingerprint, user_agent, started_at, last_heartbeat, ended_at";

/// Session store on a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    db: SqlitePool,
    clock: SharedClock,
}

impl SqliteSessionStore {
    /// Wrap a pool and create the schema if needed.
    pub async fn new(db: SqlitePool, clock: SharedClock) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS edit_sessions (
                id TEXT PRIMARY KEY,
                record_id TEXT NOT NULL,
                device_fingerprint TEXT NOT NULL,
                user_agent TEXT NOT NULL DEFAULT '',
                started_at TEXT NOT NULL,
                last_heartbeat TEXT NOT NULL,
                ended_at TEXT
            )",
        )
        .execute(&db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to create edit_sessions table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_edit_sessions_record
             ON edit_sessions (record_id, ended_at)",
        )
        .execute(&db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to create edit_sessions index: {e}")))?;

        Ok(Self { db, clock })
    }

    /// Open (creating if missing) a database file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::DatabaseError(format!("Failed to open {}: {e}", path.display()))
            })?;

        Self::new(db, Arc::new(SystemClock)).await
    }

    /// Private in-memory database, mostly for tests.
    pub async fn in_memory(clock: SharedClock) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to create in-memory pool: {e}")))?;
        Self::new(db, clock).await
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn create_session(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        user_agent: &str,
    ) -> Result<SessionId> {
        let id = SessionId::generate();
        let now = format_timestamp(self.clock.now());

        sqlx::query(
            "INSERT INTO edit_sessions
                (id, record_id, device_fingerprint, user_agent, started_at, last_heartbeat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(id.as_str())
        .bind(record_id.as_str())
        .bind(fingerprint.as_str())
        .bind(user_agent)
        .bind(&now)
        .execute(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to create session: {e}")))?;

        Ok(id)
    }

    async fn update_heartbeat(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE edit_sessions SET last_heartbeat = ?1 WHERE id = ?2")
            .bind(format_timestamp(at))
            .bind(session_id.as_str())
            .execute(&self.db)
            .await
            .map_err(|e| Error::DatabaseError(format!("Failed to update heartbeat: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Session not found: {session_id}")));
        }
        Ok(())
    }

    async fn end_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE edit_sessions SET ended_at = COALESCE(ended_at, ?1) WHERE id = ?2",
        )
        .bind(format_timestamp(at))
        .bind(session_id.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to end session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Session not found: {session_id}")));
        }
        Ok(())
    }

    async fn list_active_sessions(
        &self,
        record_id: &RecordId,
        exclude_fingerprint: &DeviceFingerprint,
        stale_threshold: Duration,
    ) -> Result<Vec<EditSession>> {
        let cutoff = format_timestamp(
            self.clock
                .now()
                .checked_sub_signed(stale_threshold)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        );

        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM edit_sessions
             WHERE record_id = ?1
               AND device_fingerprint != ?2
               AND ended_at IS NULL
               AND last_heartbeat > ?3
             ORDER BY last_heartbeat DESC"
        ))
        .bind(record_id.as_str())
        .bind(exclude_fingerprint.as_str())
        .bind(&cutoff)
        .fetch_all(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to list active sessions: {e}")))?;

        rows.into_iter().map(row_to_session).collect()
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<EditSession> {
        let row: Option<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM edit_sessions WHERE id = ?1"
        ))
        .bind(session_id.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to get session: {e}")))?;

        row.map(row_to_session)
            .transpose()?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))
    }

    async fn end_device_sessions(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE edit_sessions SET ended_at = ?1
             WHERE record_id = ?2 AND device_fingerprint = ?3 AND ended_at IS NULL",
        )
        .bind(format_timestamp(at))
        .bind(record_id.as_str())
        .bind(fingerprint.as_str())
        .execute(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to end device sessions: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn prune(&self, cutoff: DateTime<Utc>, stale_threshold: Duration) -> Result<u64> {
        let open_cutoff = open_session_cutoff(self.clock.now(), cutoff, stale_threshold);
        let result = sqlx::query(
            "DELETE FROM edit_sessions
             WHERE (ended_at IS NOT NULL AND ended_at < ?1)
                OR (ended_at IS NULL AND last_heartbeat < ?2)",
        )
        .bind(format_timestamp(cutoff))
        .bind(format_timestamp(open_cutoff))
        .execute(&self.db)
        .await
        .map_err(|e| Error::DatabaseError(format!("Failed to prune sessions: {e}")))?;

        Ok(result.rows_affected())
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::ParseError(format!("Invalid {field} timestamp '{value}': {e}")))
}

fn row_to_session(
    (id, record_id, fingerprint, user_agent, started_at, last_heartbeat, ended_at): SessionRow,
) -> Result<EditSession> {
    Ok(EditSession {
        id: SessionId::parse(&id)?,
        record_id: RecordId::parse(record_id)?,
        device_fingerprint: DeviceFingerprint::parse(fingerprint)?,
        user_agent,
        started_at: parse_timestamp("started_at", &started_at)?,
        last_heartbeat: parse_timestamp("last_heartbeat", &last_heartbeat)?,
        ended_at: ended_at
            .as_deref()
            .map(|v| parse_timestamp("ended_at", v))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn record(s: &str) -> RecordId {
        RecordId::parse(s).unwrap()
    }

    fn fp(s: &str) -> DeviceFingerprint {
        DeviceFingerprint::parse(s).unwrap()
    }

    async fn store_with_clock() -> Result<(SqliteSessionStore, ManualClock)> {
        let clock = ManualClock::new(Utc::now());
        let store = SqliteSessionStore::in_memory(Arc::new(clock.clone())).await?;
        Ok((store, clock))
    }

    #[tokio::test]
    async fn test_create_and_get_session() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let id = store
            .create_session(&record("P1"), &fp("a"), "Mozilla/5.0")
            .await?;

        let session = store.get_session(&id).await?;
        assert_eq!(session.record_id, record("P1"));
        assert_eq!(session.device_fingerprint, fp("a"));
        assert_eq!(session.user_agent, "Mozilla/5.0");
        assert!(session.ended_at.is_none());
        assert_eq!(
            format_timestamp(session.last_heartbeat),
            format_timestamp(clock.now())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_list_excludes_own_fingerprint_and_other_records() -> Result<()> {
        let (store, _clock) = store_with_clock().await?;
        store.create_session(&record("P1"), &fp("a"), "").await?;
        store.create_session(&record("P1"), &fp("b"), "").await?;
        store.create_session(&record("P2"), &fp("c"), "").await?;

        let active = store
            .list_active_sessions(&record("P1"), &fp("a"), Duration::minutes(5))
            .await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].device_fingerprint, fp("b"));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_excludes_stale_and_ended() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let stale = store.create_session(&record("P1"), &fp("b"), "").await?;
        clock.advance(Duration::seconds(200));
        let ended = store.create_session(&record("P1"), &fp("c"), "").await?;
        store.end_session(&ended, clock.now()).await?;
        let fresh = store.create_session(&record("P1"), &fp("d"), "").await?;
        clock.advance(Duration::seconds(100));

        let active = store
            .list_active_sessions(&record("P1"), &fp("a"), Duration::minutes(5))
            .await?;
        let ids: Vec<_> = active.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![fresh]);
        assert!(!ids.contains(&stale));
        Ok(())
    }

    #[tokio::test]
    async fn test_heartbeat_revives_freshness() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let id = store.create_session(&record("P1"), &fp("b"), "").await?;
        clock.advance(Duration::seconds(290));
        store.update_heartbeat(&id, clock.now()).await?;
        clock.advance(Duration::seconds(100));

        let active = store
            .list_active_sessions(&record("P1"), &fp("a"), Duration::minutes(5))
            .await?;
        assert_eq!(active.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_session_not_found() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let result = store
            .update_heartbeat(&SessionId::generate(), clock.now())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_end_session_keeps_first_end() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let id = store.create_session(&record("P1"), &fp("a"), "").await?;
        let first = clock.now();
        store.end_session(&id, first).await?;
        clock.advance(Duration::seconds(30));
        store.end_session(&id, clock.now()).await?;

        let session = store.get_session(&id).await?;
        assert_eq!(
            session.ended_at.map(format_timestamp),
            Some(format_timestamp(first))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_end_device_sessions_only_touches_that_device() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        store.create_session(&record("P1"), &fp("a"), "").await?;
        store.create_session(&record("P1"), &fp("a"), "").await?;
        let other = store.create_session(&record("P1"), &fp("b"), "").await?;

        let ended = store
            .end_device_sessions(&record("P1"), &fp("a"), clock.now())
            .await?;
        assert_eq!(ended, 2);
        assert!(store.get_session(&other).await?.ended_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_removes_old_rows() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let old = store.create_session(&record("P1"), &fp("a"), "").await?;
        store.end_session(&old, clock.now()).await?;
        clock.advance(Duration::hours(2));
        let live = store.create_session(&record("P1"), &fp("b"), "").await?;

        let removed = store
            .prune(clock.now() - Duration::hours(1), Duration::minutes(5))
            .await?;
        assert_eq!(removed, 1);
        assert!(matches!(
            store.get_session(&old).await,
            Err(Error::NotFound(_))
        ));
        assert!(store.get_session(&live).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_keeps_live_sessions() -> Result<()> {
        let (store, clock) = store_with_clock().await?;
        let live = store.create_session(&record("P1"), &fp("b"), "").await?;
        clock.advance(Duration::seconds(10));

        let removed = store.prune(clock.now(), Duration::minutes(5)).await?;
        assert_eq!(removed, 0);
        store.update_heartbeat(&live, clock.now()).await?;
        assert_eq!(
            store
                .list_active_sessions(&record("P1"), &fp("a"), Duration::minutes(5))
                .await?
                .len(),
            1
        );

        clock.advance(Duration::minutes(5) + Duration::seconds(1));
        assert_eq!(store.prune(clock.now(), Duration::minutes(5)).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_creates_file_and_parent_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("sessions.db");
        let store = SqliteSessionStore::open(&path).await?;
        store.create_session(&record("P1"), &fp("a"), "").await?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let a = format_timestamp(DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap());
        let b = format_timestamp(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_000).unwrap(),
        );
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert!(a.ends_with('Z'));
    }
}
