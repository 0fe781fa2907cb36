//! A single execution attempt against one tier.
//!
//! Attempts run as their own tasks so that a detached remote attempt can keep
//! recording metrics and filling the cache after its caller has gone.

use crate::cache::FallbackCache;
use crate::metrics::MetricsRecorder;
use crate::router::CandidateTier;
use crate::{Result, RoutingError};
use futures::FutureExt as _;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tiercast_core::{
    ExecutionOutcome, FailureKind, Fingerprint, RequestId, Tier, TierError, TierExecutor,
};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::Instrument as _;

/// Output of a successful attempt.
#[derive(Debug, Clone)]
pub(crate) struct AttemptOutput {
    pub output: Vec<u8>,
    pub latency_ms: u64,
}

/// Everything an attempt task needs, owned so the task can outlive its caller.
pub(crate) struct Attempt {
    pub request_id: RequestId,
    pub number: u32,
    pub tier: Tier,
    pub variant_id: String,
    pub cost_per_request: f64,
    pub payload: Arc<[u8]>,
    pub timeout: Duration,
    pub fingerprint: Fingerprint,
}

impl Attempt {
    pub(crate) fn for_candidate(
        candidate: &CandidateTier,
        request_id: RequestId,
        number: u32,
        payload: &Arc<[u8]>,
        timeout: Duration,
        fingerprint: &Fingerprint,
    ) -> Self {
        Self {
            request_id,
            number,
            tier: candidate.tier,
            variant_id: candidate.variant.id.clone(),
            cost_per_request: candidate.cost_per_request,
            payload: Arc::clone(payload),
            timeout,
            fingerprint: fingerprint.clone(),
        }
    }

    /// Spawn the attempt. The task records exactly one outcome unless it is
    /// aborted, and caches its output on success.
    pub(crate) fn spawn(
        self,
        executor: Option<Arc<dyn TierExecutor>>,
        cache: Arc<FallbackCache>,
        recorder: Arc<MetricsRecorder>,
    ) -> JoinHandle<Result<AttemptOutput>> {
        let span = tracing::debug_span!(
            "attempt",
            request_id = %self.request_id,
            tier = %self.tier,
            attempt = self.number
        );
        tokio::spawn(self.run(executor, cache, recorder).instrument(span))
    }

    async fn run(
        self,
        executor: Option<Arc<dyn TierExecutor>>,
        cache: Arc<FallbackCache>,
        recorder: Arc<MetricsRecorder>,
    ) -> Result<AttemptOutput> {
        let started = Instant::now();
        let result = match executor {
            Some(executor) => AssertUnwindSafe(self.invoke(executor.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    tracing::warn!(%message, "Tier executor panicked");
                    Err(RoutingError::AttemptError {
                        tier: self.tier,
                        message,
                    })
                }),
            None => Err(RoutingError::TierUnavailable(self.tier)),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let outcome =
            ExecutionOutcome::new(self.request_id, self.number, self.tier, self.variant_id.as_str())
                .with_latency_ms(latency_ms);
        // Cost is incurred whenever the tier actually ran the request.
        let outcome = match &result {
            Ok(_) => outcome.with_cost(self.cost_per_request),
            Err(RoutingError::AttemptError { .. }) => outcome
                .with_cost(self.cost_per_request)
                .with_failure(FailureKind::Error),
            Err(RoutingError::AttemptTimeout { .. }) => outcome.with_failure(FailureKind::Timeout),
            Err(_) => outcome.with_failure(FailureKind::Unavailable),
        };
        recorder.record(outcome);

        let output = result?;
        cache.put(self.fingerprint, output.clone(), self.tier);
        tracing::debug!(latency_ms, "Attempt succeeded");
        Ok(AttemptOutput { output, latency_ms })
    }

    async fn invoke(&self, executor: &dyn TierExecutor) -> Result<Vec<u8>> {
        let timeout_ms = self.timeout.as_millis() as u64;
        let call = executor.invoke(&self.variant_id, &self.payload, self.timeout);
        match time::timeout(self.timeout, call).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(TierError::Timeout { .. })) | Err(_) => Err(RoutingError::AttemptTimeout {
                tier: self.tier,
                timeout_ms,
            }),
            Ok(Err(TierError::Unavailable(reason))) => {
                tracing::debug!(%reason, "Tier reported unavailable");
                Err(RoutingError::TierUnavailable(self.tier))
            }
            Ok(Err(TierError::Failed(message))) => Err(RoutingError::AttemptError {
                tier: self.tier,
                message,
            }),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(
            || "executor panicked".to_owned(),
            |message| format!("executor panicked: {message}"),
        )
}
