//! Resource awareness for routing decisions.
//!
//! The [`ResourceMonitor`] polls every tier's health endpoint and publishes an
//! immutable [`ResourceSnapshot`]. Readers clone an `Arc` to the latest
//! snapshot and never wait on network I/O; a refresh builds the next snapshot
//! completely before swapping it in. Refreshes are single-flight: callers that
//! find the snapshot stale while a poll is running wait for that poll and
//! reuse its result.

/// Background polling task
pub mod poller;

pub use poller::PollerHandle;

use crate::backends::TierBackends;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tiercast_core::{
    IgnoreRwLock as _, MonitorConfig, ResourceSnapshot, Tier, TierExecutor, TierStatus,
};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time;

/// Polls tier health and owns the current resource snapshot.
pub struct ResourceMonitor {
    backends: TierBackends,
    config: MonitorConfig,
    current: RwLock<Arc<ResourceSnapshot>>,
    refresh_gate: AsyncMutex<()>,
    refreshes: AtomicU64,
}

impl ResourceMonitor {
    /// Create a monitor; the first snapshot marks every tier unavailable
    /// until a poll completes.
    #[must_use]
    pub fn new(backends: TierBackends, config: MonitorConfig) -> Self {
        Self {
            backends,
            config,
            current: RwLock::new(Arc::new(ResourceSnapshot::initial())),
            refresh_gate: AsyncMutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Most recently published snapshot. Never blocks on I/O.
    pub fn snapshot(&self) -> Arc<ResourceSnapshot> {
        Arc::clone(&*self.current.read_ignore_poison())
    }

    /// Poll every tier now and publish the result.
    ///
    /// Health checks run concurrently, each bounded by the configured
    /// health-check timeout. A tier whose check fails or times out is marked
    /// unavailable. Waits for any poll already in flight first.
    pub async fn refresh(&self) -> Arc<ResourceSnapshot> {
        let _gate = self.refresh_gate.lock().await;
        self.poll_and_publish().await
    }

    /// Poll again unless a snapshot newer than `seen` was published while
    /// waiting for the gate, in which case that snapshot is returned.
    pub async fn refresh_since(&self, seen: &ResourceSnapshot) -> Arc<ResourceSnapshot> {
        let _gate = self.refresh_gate.lock().await;
        let latest = self.snapshot();
        if !latest.is_initial() && latest.captured_at() > seen.captured_at() {
            return latest;
        }
        self.poll_and_publish().await
    }

    /// Current snapshot, refreshed first if it is older than the configured
    /// maximum age or no poll has completed yet.
    pub async fn current(&self) -> Arc<ResourceSnapshot> {
        let snapshot = self.snapshot();
        if !self.is_stale(&snapshot) {
            return snapshot;
        }

        let _gate = self.refresh_gate.lock().await;
        let latest = self.snapshot();
        if !self.is_stale(&latest) {
            return latest;
        }
        tracing::debug!(
            age_ms = latest.age().as_millis() as u64,
            "Resource snapshot stale, refreshing"
        );
        self.poll_and_publish().await
    }

    fn is_stale(&self, snapshot: &ResourceSnapshot) -> bool {
        snapshot.is_initial() || snapshot.age() > self.config.max_snapshot_age()
    }

    /// Caller must hold the refresh gate.
    async fn poll_and_publish(&self) -> Arc<ResourceSnapshot> {
        let timeout = self.config.health_timeout();
        let polls = Tier::ALL.into_iter().map(|tier| async move {
            let status = match self.backends.get(tier) {
                Some(executor) => Self::poll_tier(tier, executor.as_ref(), timeout).await,
                None => TierStatus::unavailable(),
            };
            (tier, status)
        });
        let statuses = join_all(polls).await;

        let snapshot = Arc::new(
            statuses
                .into_iter()
                .fold(ResourceSnapshot::unavailable(), |snapshot, (tier, status)| {
                    snapshot.with_status(tier, status)
                }),
        );
        *self.current.write_ignore_poison() = Arc::clone(&snapshot);
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        snapshot
    }

    /// Number of completed refreshes.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Poll interval for the background task.
    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    /// Start polling on the configured interval.
    ///
    /// Polling stops when the returned handle is shut down or dropped.
    #[must_use]
    pub fn spawn_polling(self: &Arc<Self>) -> PollerHandle {
        PollerHandle::spawn(Arc::clone(self))
    }

    async fn poll_tier(tier: Tier, executor: &dyn TierExecutor, timeout: Duration) -> TierStatus {
        match time::timeout(timeout, executor.healthcheck(timeout)).await {
            Ok(Ok(health)) if health.available => {
                let cost = if tier.is_remote() {
                    executor.estimate_cost()
                } else {
                    0.0
                };
                TierStatus::available(health.load).with_cost(cost)
            }
            Ok(Ok(_)) => {
                tracing::debug!(%tier, "Tier reports itself unavailable");
                TierStatus::unavailable()
            }
            Ok(Err(error)) => {
                tracing::warn!(%tier, %error, "Health check failed; marking tier unavailable");
                TierStatus::unavailable()
            }
            Err(_elapsed) => {
                tracing::warn!(
                    %tier,
                    timeout_ms = timeout.as_millis() as u64,
                    "Health check timed out; marking tier unavailable"
                );
                TierStatus::unavailable()
            }
        }
    }
}
