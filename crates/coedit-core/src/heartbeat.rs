//! Periodic heartbeat for a registered session.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::session::SessionId;
use crate::store::SessionStore;
use crate::task::TaskHandle;

/// Keeps a session's `last_heartbeat` fresh while the handle lives.
#[derive(Debug)]
pub struct HeartbeatHandle {
    task: TaskHandle,
    store: Arc<dyn SessionStore>,
    session_id: SessionId,
}

/// Spawns heartbeat loops.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatEmitter;

impl HeartbeatEmitter {
    /// Start heartbeating `session_id` every `interval`.
    ///
    /// The first write happens one interval after start; registration has
    /// already stamped the row. Failed writes are skipped, not retried.
    pub fn start(
        store: Arc<dyn SessionStore>,
        session_id: SessionId,
        interval: Duration,
    ) -> HeartbeatHandle {
        let loop_store = Arc::clone(&store);
        let loop_id = session_id.clone();

        let task = TaskHandle::spawn("heartbeat", move |mut shutdown| async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = loop_store.now();
                        if let Err(e) = loop_store.update_heartbeat(&loop_id, now).await {
                            tracing::debug!(session_id = %loop_id, error = %e, "heartbeat skipped");
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
        });

        HeartbeatHandle {
            task,
            store,
            session_id,
        }
    }
}

impl HeartbeatHandle {
    /// Session being kept alive.
    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Stop heartbeating and mark the session ended (best effort).
    pub async fn stop(self) {
        self.task.stop().await;

        let now = self.store.now();
        match self.store.end_session(&self.session_id, now).await {
            Ok(()) => tracing::info!(session_id = %self.session_id, "edit session ended"),
            Err(e) => tracing::warn!(
                session_id = %self.session_id,
                error = %e,
                "failed to mark edit session ended; it will go stale"
            ),
        }
    }
}
