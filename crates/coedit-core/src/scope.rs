//! Edit scope: registration, heartbeat and conflict polling for one view.
//!
//! Entering a scope acquires both periodic tasks; [`EditScope::exit`]
//! releases them and ends the session. A scope dropped without `exit`
//! aborts its tasks and leaves the row to go stale.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::CoeditConfig;
use crate::conflict::ConflictInfo;
use crate::detector::{ConflictDetector, ConflictNotifier, DetectorHandle};
use crate::heartbeat::{HeartbeatEmitter, HeartbeatHandle};
use crate::lifecycle::{EditPhase, Lifecycle};
use crate::registrar::SessionRegistrar;
use crate::resolution::ConflictResolver;
use crate::save::{RecordWriter, SaveGate, SaveOutcome};
use crate::session::{DeviceFingerprint, RecordId, SessionId};
use crate::store::SessionStore;
use crate::Result;

/// One device editing one record.
#[derive(Debug)]
pub struct EditScope {
    store: Arc<dyn SessionStore>,
    record_id: RecordId,
    fingerprint: DeviceFingerprint,
    lifecycle: Lifecycle,
    detector: ConflictDetector,
    heartbeat: Option<HeartbeatHandle>,
    polling: Option<DetectorHandle>,
}

impl EditScope {
    /// Register a session and start heartbeat and conflict polling.
    ///
    /// If registration fails the scope still polls for conflicts; it just
    /// has no session of its own.
    pub async fn enter(
        store: Arc<dyn SessionStore>,
        config: &CoeditConfig,
        record_id: RecordId,
        fingerprint: DeviceFingerprint,
        user_agent: &str,
        notifier: Arc<dyn ConflictNotifier>,
    ) -> Self {
        let mut lifecycle = Lifecycle::new();

        let session_id =
            SessionRegistrar::register(store.as_ref(), &record_id, &fingerprint, user_agent).await;

        let heartbeat = match session_id {
            Some(id) => match lifecycle.register(id.clone(), store.now()) {
                Ok(()) => Some(HeartbeatEmitter::start(
                    Arc::clone(&store),
                    id,
                    config.heartbeat_interval(),
                )),
                Err(e) => {
                    tracing::error!(error = %e, "edit scope could not enter registered phase");
                    None
                }
            },
            None => None,
        };

        let detector = ConflictDetector::new(
            Arc::clone(&store),
            record_id.clone(),
            fingerprint.clone(),
            config.stale_threshold(),
        );
        let polling = detector.clone().start(config.poll_interval(), notifier);

        Self {
            store,
            record_id,
            fingerprint,
            lifecycle,
            detector,
            heartbeat,
            polling: Some(polling),
        }
    }

    /// Record being edited.
    #[must_use]
    pub const fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// This device's fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> &DeviceFingerprint {
        &self.fingerprint
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> EditPhase {
        self.lifecycle.phase()
    }

    /// Own session id, if registration succeeded.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        self.lifecycle.session_id()
    }

    /// Latest conflict snapshot from the poller.
    #[must_use]
    pub fn conflict(&self) -> ConflictInfo {
        self.polling
            .as_ref()
            .map(DetectorHandle::current)
            .unwrap_or_default()
    }

    /// Subscribe to conflict snapshots.
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<ConflictInfo>> {
        self.polling.as_ref().map(DetectorHandle::subscribe)
    }

    /// Save through the conflict gate.
    ///
    /// Checks the store once more before deciding; if that read fails, the
    /// poller's latest snapshot is used instead.
    pub async fn save(
        &self,
        resolver: &dyn ConflictResolver,
        writer: &dyn RecordWriter,
        payload: &serde_json::Value,
    ) -> Result<SaveOutcome> {
        let conflict = match self.detector.check().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(
                    record_id = %self.record_id,
                    error = %e,
                    "pre-save conflict check failed; using last snapshot"
                );
                self.conflict()
            }
        };

        SaveGate::save(
            &conflict,
            resolver,
            writer,
            &self.record_id,
            payload,
            self.store.now(),
        )
        .await
    }

    /// Stop both tasks, end the session and move to `Ended`.
    pub async fn exit(mut self) -> Lifecycle {
        if let Some(polling) = self.polling.take() {
            polling.stop().await;
        }
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        if let Err(e) = self.lifecycle.end(self.store.now()) {
            tracing::error!(error = %e, "edit scope could not enter ended phase");
        }
        tracing::debug!(record_id = %self.record_id, "edit scope exited");
        std::mem::take(&mut self.lifecycle)
    }
}
