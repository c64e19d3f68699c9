//! Edit session types
//!
//! An [`EditSession`] is one device (browser tab, terminal, ...) actively
//! editing one record. Identifiers are validated at construction time, so a
//! `RecordId` or `DeviceFingerprint` in hand is always well-formed.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// Reserved keywords that cannot be used as record ids.
const RESERVED_KEYWORDS: &[&str] = &["null", "undefined", "true", "false", "none", "nil"];

/// Maximum allowed length for a record id.
pub const MAX_RECORD_ID_LENGTH: usize = 128;

/// Maximum allowed length for a device fingerprint.
pub const MAX_FINGERPRINT_LENGTH: usize = 256;

/// Unique session identifier (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse a session id, which must be a UUID.
    pub fn parse(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|e| Error::validation("session_id", e.to_string()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the record being edited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Parse and validate a record id.
    ///
    /// Rejects empty ids, ids longer than [`MAX_RECORD_ID_LENGTH`], control
    /// characters and reserved keywords (case-insensitive).
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(Error::validation("record_id", "cannot be empty"));
        }

        if trimmed.chars().count() > MAX_RECORD_ID_LENGTH {
            return Err(Error::validation(
                "record_id",
                format!("exceeds maximum length of {MAX_RECORD_ID_LENGTH} characters"),
            ));
        }

        if trimmed.chars().any(char::is_control) {
            return Err(Error::validation(
                "record_id",
                "contains control characters",
            ));
        }

        let lower = trimmed.to_lowercase();
        if RESERVED_KEYWORDS.contains(&lower.as_str()) {
            return Err(Error::validation(
                "record_id",
                format!("'{trimmed}' is a reserved keyword"),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RecordId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Opaque client-generated identifier distinguishing devices or tabs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Parse and validate a fingerprint.
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(Error::validation("device_fingerprint", "cannot be empty"));
        }

        if trimmed.chars().count() > MAX_FINGERPRINT_LENGTH {
            return Err(Error::validation(
                "device_fingerprint",
                format!("exceeds maximum length of {MAX_FINGERPRINT_LENGTH} characters"),
            ));
        }

        if trimmed.chars().any(char::is_control) {
            return Err(Error::validation(
                "device_fingerprint",
                "contains control characters",
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Derive a fingerprint by hashing identifying parts.
    ///
    /// The same parts always give the same fingerprint; callers mix in
    /// something per-process (pid, start time) to tell tabs apart.
    #[must_use]
    pub fn derive<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref().as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        Self(format!("dev-{}", hex::encode(&digest[..12])))
    }

    /// Get the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DeviceFingerprint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<DeviceFingerprint> for String {
    fn from(fp: DeviceFingerprint) -> Self {
        fp.0
    }
}

/// Liveness classification of a stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Not ended and heartbeat is fresh
    Active,
    /// Not ended but heartbeat is older than the stale threshold
    Stale,
    /// Explicitly ended
    Ended,
}

/// One device actively editing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSession {
    /// Unique identifier
    pub id: SessionId,
    /// Record being edited
    pub record_id: RecordId,
    /// Device holding the session
    pub device_fingerprint: DeviceFingerprint,
    /// Client user agent, free text
    pub user_agent: String,
    /// When the session was registered
    pub started_at: DateTime<Utc>,
    /// Last liveness update
    pub last_heartbeat: DateTime<Utc>,
    /// When the session was ended, if it was
    pub ended_at: Option<DateTime<Utc>>,
}

impl EditSession {
    /// Create a new, unended session stamped at `now`.
    #[must_use]
    pub fn new(
        record_id: RecordId,
        device_fingerprint: DeviceFingerprint,
        user_agent: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            record_id,
            device_fingerprint,
            user_agent: user_agent.into(),
            started_at: now,
            last_heartbeat: now,
            ended_at: None,
        }
    }

    /// Whether `ended_at` is set.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Whether the heartbeat is at least `threshold` old at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now - self.last_heartbeat >= threshold
    }

    /// Classify the session. An ended session is `Ended` even if its
    /// heartbeat is also stale.
    #[must_use]
    pub fn status(&self, now: DateTime<Utc>, threshold: Duration) -> SessionStatus {
        if self.is_ended() {
            SessionStatus::Ended
        } else if self.is_stale(now, threshold) {
            SessionStatus::Stale
        } else {
            SessionStatus::Active
        }
    }

    /// Whether the session counts as a live editor at `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.status(now, threshold) == SessionStatus::Active
    }
}
