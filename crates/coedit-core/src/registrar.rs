//! Session registration on scope entry.

use crate::session::{DeviceFingerprint, RecordId, SessionId};
use crate::store::SessionStore;

/// Registers one session per device and record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRegistrar;

impl SessionRegistrar {
    /// Create the session row for this device.
    ///
    /// Any earlier open session of the same device on the same record is
    /// ended first. Failures are logged and yield `None`; the caller keeps
    /// editing without conflict protection.
    pub async fn register(
        store: &dyn SessionStore,
        record_id: &RecordId,
        fingerprint: &DeviceFingerprint,
        user_agent: &str,
    ) -> Option<SessionId> {
        match store
            .end_device_sessions(record_id, fingerprint, store.now())
            .await
        {
            Ok(0) => {}
            Ok(n) => tracing::debug!(
                record_id = %record_id,
                device = %fingerprint,
                ended = n,
                "ended previous sessions for this device"
            ),
            Err(e) => tracing::debug!(
                record_id = %record_id,
                device = %fingerprint,
                error = %e,
                "could not end previous sessions for this device"
            ),
        }

        match store
            .create_session(record_id, fingerprint, user_agent)
            .await
        {
            Ok(session_id) => {
                tracing::info!(
                    record_id = %record_id,
                    device = %fingerprint,
                    session_id = %session_id,
                    "edit session registered"
                );
                Some(session_id)
            }
            Err(e) => {
                tracing::warn!(
                    record_id = %record_id,
                    device = %fingerprint,
                    error = %e,
                    "failed to register edit session; continuing without conflict protection"
                );
                None
            }
        }
    }
}
