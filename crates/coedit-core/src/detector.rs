//! Polling conflict detector.
//!
//! Polls the store for other devices' active sessions, runs the result
//! through [`detect_conflicts`], and publishes the snapshot on a watch
//! channel. A warning goes to the [`ConflictNotifier`] only when a conflict
//! first appears.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::conflict::{detect_conflicts, ConflictInfo, ConflictNotice, ConflictWatch};
use crate::session::{DeviceFingerprint, RecordId};
use crate::store::SessionStore;
use crate::task::TaskHandle;
use crate::Result;

/// Receives one-shot conflict warnings.
pub trait ConflictNotifier: Send + Sync {
    /// A conflict just appeared on `record_id`.
    fn notify(&self, record_id: &RecordId, notice: &ConflictNotice);
}

/// Logs conflict warnings at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl ConflictNotifier for TracingNotifier {
    fn notify(&self, record_id: &RecordId, notice: &ConflictNotice) {
        tracing::warn!(
            record_id = %record_id,
            other_devices = notice.other_devices.len(),
            "{}",
            notice.message()
        );
    }
}

/// Conflict check for one record and device.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    store: Arc<dyn SessionStore>,
    record_id: RecordId,
    fingerprint: DeviceFingerprint,
    stale_threshold: chrono::Duration,
}

/// Handle to a running detector.
#[derive(Debug)]
pub struct DetectorHandle {
    task: TaskHandle,
    snapshot: watch::Receiver<ConflictInfo>,
}

impl ConflictDetector {
    /// Create a detector for `fingerprint` editing `record_id`.
    pub fn new(
        store: Arc<dyn SessionStore>,
        record_id: RecordId,
        fingerprint: DeviceFingerprint,
        stale_threshold: chrono::Duration,
    ) -> Self {
        Self {
            store,
            record_id,
            fingerprint,
            stale_threshold,
        }
    }

    /// Record being watched.
    #[must_use]
    pub const fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Poll once.
    pub async fn check(&self) -> Result<ConflictInfo> {
        let sessions = self
            .store
            .list_active_sessions(&self.record_id, &self.fingerprint, self.stale_threshold)
            .await?;
        Ok(detect_conflicts(
            &sessions,
            &self.fingerprint,
            self.store.now(),
            self.stale_threshold,
        ))
    }

    /// Poll now and then every `interval` until stopped.
    ///
    /// A failed poll is logged and the previous snapshot kept.
    pub fn start(self, interval: Duration, notifier: Arc<dyn ConflictNotifier>) -> DetectorHandle {
        let (tx, snapshot) = watch::channel(ConflictInfo::none());

        let task = TaskHandle::spawn("conflict-poll", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut tracker = ConflictWatch::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.poll(&mut tracker, &tx, notifier.as_ref()).await,
                    _ = shutdown.changed() => break,
                }
            }
        });

        DetectorHandle { task, snapshot }
    }

    async fn poll(
        &self,
        tracker: &mut ConflictWatch,
        tx: &watch::Sender<ConflictInfo>,
        notifier: &dyn ConflictNotifier,
    ) {
        match self.check().await {
            Ok(info) => {
                tracing::debug!(
                    record_id = %self.record_id,
                    has_conflict = info.has_conflict,
                    other_devices = info.other_devices.len(),
                    "conflict poll"
                );
                tx.send_replace(info.clone());
                if let Some(notice) = tracker.observe(info) {
                    notifier.notify(&self.record_id, &notice);
                }
            }
            Err(e) => tracing::warn!(
                record_id = %self.record_id,
                error = %e,
                "conflict poll failed; keeping previous snapshot"
            ),
        }
    }
}

impl DetectorHandle {
    /// Latest snapshot.
    #[must_use]
    pub fn current(&self) -> ConflictInfo {
        self.snapshot.borrow().clone()
    }

    /// A receiver that sees every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConflictInfo> {
        self.snapshot.clone()
    }

    /// Stop polling.
    pub async fn stop(self) {
        self.task.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::InMemorySessionStore;

    #[derive(Default)]
    struct CountingNotifier {
        notices: Mutex<Vec<usize>>,
    }

    impl ConflictNotifier for CountingNotifier {
        fn notify(&self, _record_id: &RecordId, notice: &ConflictNotice) {
            self.notices.lock().unwrap().push(notice.other_devices.len());
        }
    }

    fn record() -> RecordId {
        RecordId::parse("P1").unwrap()
    }

    fn fp(s: &str) -> DeviceFingerprint {
        DeviceFingerprint::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_check_reports_other_device() {
        let store = Arc::new(InMemorySessionStore::default());
        store.create_session(&record(), &fp("b"), "ua").await.unwrap();

        let detector =
            ConflictDetector::new(store, record(), fp("a"), chrono::Duration::minutes(5));
        let info = detector.check().await.unwrap();
        assert!(info.has_conflict);
        assert_eq!(info.other_devices[0].device_fingerprint, fp("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_poll_and_single_notice() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemorySessionStore::new(Arc::new(clock.clone())));
        store.create_session(&record(), &fp("b"), "ua").await.unwrap();

        let notifier = Arc::new(CountingNotifier::default());
        let handle = ConflictDetector::new(
            store.clone(),
            record(),
            fp("a"),
            chrono::Duration::minutes(5),
        )
        .start(Duration::from_secs(30), notifier.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.current().has_conflict);

        for _ in 0..3 {
            clock.advance(chrono::Duration::seconds(30));
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        assert!(handle.current().has_conflict);
        assert_eq!(notifier.notices.lock().unwrap().as_slice(), &[1]);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_clears_when_other_goes_stale() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(InMemorySessionStore::new(Arc::new(clock.clone())));
        store.create_session(&record(), &fp("b"), "ua").await.unwrap();

        let handle = ConflictDetector::new(
            store.clone(),
            record(),
            fp("a"),
            chrono::Duration::minutes(5),
        )
        .start(Duration::from_secs(30), Arc::new(TracingNotifier));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.current().has_conflict);

        clock.advance(chrono::Duration::seconds(300));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!handle.current().has_conflict);

        handle.stop().await;
    }
}
