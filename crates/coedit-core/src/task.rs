//! Stop handles for periodic background tasks.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a spawned periodic task.
///
/// [`stop`](Self::stop) signals the task and waits for it to finish.
/// Dropping the handle without stopping aborts the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `make(shutdown_rx)` on the current runtime.
    ///
    /// The task should return once the receiver reports a change or its
    /// sender is gone.
    pub fn spawn<F, Fut>(name: &'static str, make: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let join = tokio::spawn(make(rx));
        Self {
            name,
            shutdown,
            join: Some(join),
        }
    }

    /// Task name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the task has already returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal shutdown and wait for the task to return.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                if !e.is_cancelled() {
                    tracing::warn!(task = self.name, error = %e, "background task failed");
                }
            }
        }
        tracing::debug!(task = self.name, "background task stopped");
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
