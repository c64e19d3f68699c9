//! Persistence boundary for edit sessions.
//!
//! All operations are independent row updates; nothing here serializes
//! heartbeats, reads and end writes against each other.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::config::DEFAULT_STALE_THRESHOLD_SECS;
use crate::session::{DeviceFingerprint, EditSession, RecordId, SessionId};
use crate::Result;

/// Default staleness threshold for [`SessionStore::list_active_sessions`].
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn default_stale_threshold() -> Duration {
    Duration::seconds(DEFAULT_STALE_THRESHOLD_SECS as i64)
}

/// Storage of [`EditSession`] rows.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Current time according to the store's clock.
    fn now(&self) -> DateTime<Utc>;

    /// Insert a new session stamped at the store's current time.
    async fn create_session(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        user_agent: &str,
    ) -> Result<SessionId>;

    /// Set `last_heartbeat`. Fails with `NotFound` for unknown ids.
    async fn update_heartbeat(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()>;

    /// Set `ended_at` if not already set. Fails with `NotFound` for unknown ids.
    async fn end_session(&self, session_id: &SessionId, at: DateTime<Utc>) -> Result<()>;

    /// Sessions on `record_id` from other devices that are not ended and
    /// whose heartbeat is younger than `stale_threshold`, most recent first.
    async fn list_active_sessions(
        &self,
        record_id: &RecordId,
        exclude_fingerprint: &DeviceFingerprint,
        stale_threshold: Duration,
    ) -> Result<Vec<EditSession>>;

    /// Fetch one session by id.
    async fn get_session(&self, session_id: &SessionId) -> Result<EditSession>;

    /// End every open session of `fingerprint` on `record_id`. Returns how
    /// many were ended.
    async fn end_device_sessions(
        &self,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Delete sessions that ended before `cutoff`, and open sessions whose
    /// last heartbeat is before `cutoff` and already stale under
    /// `stale_threshold`. Live sessions are never deleted.
    async fn prune(&self, cutoff: DateTime<Utc>, stale_threshold: Duration) -> Result<u64>;
}

/// Heartbeat cutoff for pruning open sessions: the earlier of `cutoff` and
/// the staleness boundary at `now`.
pub(crate) fn open_session_cutoff(
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
    stale_threshold: Duration,
) -> DateTime<Utc> {
    now.checked_sub_signed(stale_threshold)
        .map_or(DateTime::<Utc>::MIN_UTC, |stale| stale.min(cutoff))
}
