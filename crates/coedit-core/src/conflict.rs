//! Conflict detection
//!
//! [`detect_conflicts`] is a pure function over a snapshot of session rows;
//! the poller in [`crate::detector`] feeds it query results and wall-clock
//! time. [`ConflictWatch`] turns a stream of snapshots into one-shot
//! warnings, so a persisting conflict is reported once, not on every poll.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{DeviceFingerprint, EditSession, SessionId};

/// Another device actively editing the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherDevice {
    /// Session held by that device
    pub id: SessionId,
    /// The device's fingerprint
    pub device_fingerprint: DeviceFingerprint,
    /// Its last heartbeat
    pub last_heartbeat: DateTime<Utc>,
    /// Its user agent
    pub user_agent: String,
}

impl From<&EditSession> for OtherDevice {
    fn from(session: &EditSession) -> Self {
        Self {
            id: session.id.clone(),
            device_fingerprint: session.device_fingerprint.clone(),
            last_heartbeat: session.last_heartbeat,
            user_agent: session.user_agent.clone(),
        }
    }
}

/// Snapshot of who else is editing a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// True when `other_devices` is non-empty
    pub has_conflict: bool,
    /// Other active editors, most recent heartbeat first
    pub other_devices: Vec<OtherDevice>,
}

impl ConflictInfo {
    /// The "no known conflict" snapshot.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Build a snapshot from a list of other devices.
    #[must_use]
    pub fn from_devices(mut other_devices: Vec<OtherDevice>) -> Self {
        other_devices.sort_by(|a, b| b.last_heartbeat.cmp(&a.last_heartbeat));
        Self {
            has_conflict: !other_devices.is_empty(),
            other_devices,
        }
    }
}

/// Compute the conflict snapshot for `self_fingerprint`.
///
/// A session counts as a conflict when it belongs to another device, has no
/// `ended_at`, and its heartbeat is younger than `stale_threshold` at `now`.
/// Rows are expected to be for a single record.
#[must_use]
pub fn detect_conflicts(
    all_sessions: &[EditSession],
    self_fingerprint: &DeviceFingerprint,
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> ConflictInfo {
    let others = all_sessions
        .iter()
        .filter(|s| &s.device_fingerprint != self_fingerprint)
        .filter(|s| s.is_active(now, stale_threshold))
        .map(OtherDevice::from)
        .collect();

    ConflictInfo::from_devices(others)
}

/// Warning raised when a conflict first appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictNotice {
    /// Devices editing at the time of the transition
    pub other_devices: Vec<OtherDevice>,
}

impl ConflictNotice {
    /// Human-readable warning line.
    #[must_use]
    pub fn message(&self) -> String {
        match self.other_devices.len() {
            1 => "Another device is editing this record".to_string(),
            n => format!("{n} other devices are editing this record"),
        }
    }
}

/// Tracks the latest snapshot and emits a notice on each
/// no-conflict to conflict transition.
#[derive(Debug, Clone, Default)]
pub struct ConflictWatch {
    current: ConflictInfo,
}

impl ConflictWatch {
    /// Start with no known conflict.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot.
    #[must_use]
    pub const fn current(&self) -> &ConflictInfo {
        &self.current
    }

    /// Record a fresh snapshot.
    ///
    /// Returns a notice only if the previous snapshot had no conflict and
    /// this one does.
    pub fn observe(&mut self, info: ConflictInfo) -> Option<ConflictNotice> {
        let was_conflicting = self.current.has_conflict;
        self.current = info;

        (!was_conflicting && self.current.has_conflict).then(|| ConflictNotice {
            other_devices: self.current.other_devices.clone(),
        })
    }
}
