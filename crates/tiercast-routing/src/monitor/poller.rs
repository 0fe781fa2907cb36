//! Recurring background refresh of the resource snapshot.

use super::ResourceMonitor;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle to the background polling task.
///
/// Dropping the handle stops polling; [`PollerHandle::shutdown`] also waits
/// for the task to finish.
pub struct PollerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub(crate) fn spawn(monitor: Arc<ResourceMonitor>) -> Self {
        let token = CancellationToken::new();
        let stop = token.clone();
        let period = monitor.poll_interval();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::debug!(interval_ms = period.as_millis() as u64, "Resource polling started");
            loop {
                tokio::select! {
                    () = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let snapshot = monitor.refresh().await;
                        tracing::trace!(
                            any_available = snapshot.any_available(),
                            "Resource snapshot refreshed"
                        );
                    }
                }
            }
            tracing::debug!("Resource polling stopped");
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Whether the polling task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop polling and wait for the task to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "Resource polling task ended abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
