//! In-memory session store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{open_session_cutoff, SessionStore};
use crate::clock::{SharedClock, SystemClock};
use crate::session::{DeviceFingerprint, EditSession, RecordId, SessionId};
use crate::{Error, Result};

/// Session store held in process memory. Clones share the same rows.
#[derive(Debug, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<Vec<EditSession>>>,
    clock: SharedClock,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl InMemorySessionStore {
    /// Create an empty store on the given clock.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    /// Every stored row, in insertion order.
    pub async fn snapshot(&self) -> Vec<EditSession> {
        self.sessions.read().await.clone()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn create_session(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        user_agent: &str,
    ) -> Result<SessionId> {
        let session = EditSession::new(
            record_id.clone(),
            fingerprint.clone(),
            user_agent,
            self.clock.now(),
        );
        let id = session.id.clone();
        self.sessions.write().await.push(session);
        Ok(id)
    }

    async fn update_heartbeat(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()> {
        self.sessions
            .write()
            .await
            .iter_mut()
            .find(|s| &s.id == session_id)
            .map(|s| s.last_heartbeat = at)
            .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))
    }

    async fn end_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()> {
        self.sessions
            .write()
            .await
            .iter_mut()
            .find(|s| &s.id == session_id)
            .map(|s| {
                s.ended_at.get_or_insert(at);
            })
            .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))
    }

    async fn list_active_sessions(
        &self,
        record_id: &RecordId,
        exclude_fingerprint: &DeviceFingerprint,
        stale_threshold: Duration,
    ) -> Result<Vec<EditSession>> {
        let now = self.clock.now();
        let mut active: Vec<EditSession> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|s| &s.record_id == record_id)
            .filter(|s| &s.device_fingerprint != exclude_fingerprint)
            .filter(|s| s.is_active(now, stale_threshold))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.last_heartbeat.cmp(&a.last_heartbeat));
        Ok(active)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<EditSession> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| &s.id == session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Session not found: {session_id}")))
    }

    async fn end_device_sessions(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let ended = sessions
            .iter_mut()
            .filter(|s| &s.record_id == record_id && &s.device_fingerprint == fingerprint)
            .filter(|s| s.ended_at.is_none())
            .map(|s| s.ended_at = Some(at))
            .count();
        drop(sessions);
        Ok(u64::try_from(ended).unwrap_or(u64::MAX))
    }

    async fn prune(&self, cutoff: DateTime<Utc>, stale_threshold: Duration) -> Result<u64> {
        let open_cutoff = open_session_cutoff(self.clock.now(), cutoff, stale_threshold);
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|s| match s.ended_at {
            Some(at) => at >= cutoff,
            None => s.last_heartbeat >= open_cutoff,
        });
        let removed = before.saturating_sub(sessions.len());
        drop(sessions);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn record() -> RecordId {
        RecordId::parse("P1").unwrap()
    }

    fn fp(s: &str) -> DeviceFingerprint {
        DeviceFingerprint::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_clones_share_rows() -> Result<()> {
        let store = InMemorySessionStore::default();
        let other = store.clone();
        let id = store.create_session(&record(), &fp("a"), "ua").await?;
        assert_eq!(other.get_session(&id).await?.user_agent, "ua");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_matches_staleness_rule() -> Result<()> {
        let clock = ManualClock::new(Utc::now());
        let store = InMemorySessionStore::new(Arc::new(clock.clone()));
        store.create_session(&record(), &fp("b"), "").await?;
        clock.advance(Duration::seconds(299));
        assert_eq!(
            store
                .list_active_sessions(&record(), &fp("a"), Duration::minutes(5))
                .await?
                .len(),
            1
        );
        clock.advance(Duration::seconds(1));
        assert!(store
            .list_active_sessions(&record(), &fp("a"), Duration::minutes(5))
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_keeps_live_sessions() -> Result<()> {
        let clock = ManualClock::new(Utc::now());
        let store = InMemorySessionStore::new(Arc::new(clock.clone()));
        let live = store.create_session(&record(), &fp("b"), "").await?;
        let ended = store.create_session(&record(), &fp("c"), "").await?;
        store.end_session(&ended, clock.now()).await?;
        clock.advance(Duration::seconds(10));

        assert_eq!(store.prune(clock.now(), Duration::minutes(5)).await?, 1);
        store.update_heartbeat(&live, clock.now()).await?;
        assert_eq!(
            store
                .list_active_sessions(&record(), &fp("a"), Duration::minutes(5))
                .await?
                .len(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_prune_removes_stale_open_sessions() -> Result<()> {
        let clock = ManualClock::new(Utc::now());
        let store = InMemorySessionStore::new(Arc::new(clock.clone()));
        let stale = store.create_session(&record(), &fp("b"), "").await?;
        clock.advance(Duration::minutes(5) + Duration::seconds(1));

        assert_eq!(store.prune(clock.now(), Duration::minutes(5)).await?, 1);
        assert!(matches!(
            store.get_session(&stale).await,
            Err(Error::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_end_unknown_session_not_found() {
        let store = InMemorySessionStore::default();
        let result = store.end_session(&SessionId::generate(), Utc::now()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_end_device_sessions_counts() -> Result<()> {
        let store = InMemorySessionStore::default();
        store.create_session(&record(), &fp("a"), "").await?;
        store.create_session(&record(), &fp("b"), "").await?;
        assert_eq!(
            store
                .end_device_sessions(&record(), &fp("a"), Utc::now())
                .await?,
            1
        );
        assert_eq!(
            store
                .end_device_sessions(&record(), &fp("a"), Utc::now())
                .await?,
            0
        );
        Ok(())
    }
}
