//! Execution engine: drives a request down its fallback chain.
//!
//! A request is routed against the current resource snapshot, attempted on the
//! best candidate, and retried on the next one when an attempt fails. A tier
//! that turns out to be down forces a fresh snapshot and a new route; timeouts
//! and application errors simply advance to the next precomputed candidate.
//! When candidates or attempts run out, the fallback cache is consulted.

mod attempt;
/// Per-request state machine
pub mod state;

pub use state::{ExecutionState, StateTracker};

use crate::backends::TierBackends;
use crate::cache::FallbackCache;
use crate::metrics::MetricsRecorder;
use crate::monitor::ResourceMonitor;
use crate::router::{CandidateTier, TierRouter, VariantRegistry};
use crate::{Result, RoutingError};
use attempt::{Attempt, AttemptOutput};
use std::collections::VecDeque;
use std::sync::Arc;
use tiercast_core::{
    EngineConfig, ExecutionOutcome, FailureKind, Fingerprint, InferenceRequest, InferenceResult,
    TelemetrySink, Tier, VariantCatalog,
};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Routes, executes, retries, and falls back to cache.
pub struct ExecutionEngine {
    config: EngineConfig,
    router: TierRouter,
    monitor: Arc<ResourceMonitor>,
    backends: TierBackends,
    cache: Arc<FallbackCache>,
    recorder: Arc<MetricsRecorder>,
}

impl ExecutionEngine {
    /// Create an engine over a loaded variant registry and the tier executors.
    #[must_use]
    pub fn new(config: EngineConfig, registry: Arc<VariantRegistry>, backends: TierBackends) -> Self {
        Self {
            router: TierRouter::new(registry, &config),
            monitor: Arc::new(ResourceMonitor::new(backends.clone(), config.monitor.clone())),
            backends,
            cache: Arc::new(FallbackCache::new(config.cache.clone())),
            recorder: Arc::new(MetricsRecorder::new(&config.metrics)),
            config,
        }
    }

    /// Create an engine, loading every variant from `catalog`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the catalog cannot
    /// be loaded.
    pub fn from_catalog(
        config: EngineConfig,
        catalog: &dyn VariantCatalog,
        backends: TierBackends,
    ) -> Result<Self> {
        config.validate()?;
        let registry = VariantRegistry::load(catalog)?;
        Ok(Self::new(config, Arc::new(registry), backends))
    }

    /// Forward every attempt outcome to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.recorder = Arc::new(MetricsRecorder::new(&self.config.metrics).with_sink(sink));
        self
    }

    /// Resource monitor feeding routing decisions.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    /// Fallback cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<FallbackCache> {
        &self.cache
    }

    /// Metrics recorder.
    #[must_use]
    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    /// Router used for every decision.
    #[must_use]
    pub fn router(&self) -> &TierRouter {
        &self.router
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ingress entry point.
    ///
    /// # Errors
    /// Returns [`RoutingError::InvalidRequest`] for malformed requests and
    /// [`RoutingError::Exhausted`] when nothing could answer.
    pub async fn submit(&self, request: InferenceRequest) -> Result<InferenceResult> {
        self.execute(&request).await
    }

    /// Execute a request to completion.
    ///
    /// # Errors
    /// Returns [`RoutingError::InvalidRequest`] for malformed requests and
    /// [`RoutingError::Exhausted`] when nothing could answer.
    pub async fn execute(&self, request: &InferenceRequest) -> Result<InferenceResult> {
        self.execute_with_cancel(request, CancellationToken::new()).await
    }

    /// Execute a request that the caller may cancel.
    ///
    /// Cancelling aborts an in-flight local attempt and records it as
    /// cancelled. An in-flight remote attempt is detached: it finishes in the
    /// background, records its outcome, and fills the cache.
    ///
    /// # Errors
    /// Returns [`RoutingError::Cancelled`] once `cancel` fires, in addition to
    /// the errors of [`ExecutionEngine::execute`].
    pub async fn execute_with_cancel(
        &self,
        request: &InferenceRequest,
        cancel: CancellationToken,
    ) -> Result<InferenceResult> {
        self.validate(request)?;

        let started = Instant::now();
        let fingerprint = request.fingerprint();
        let payload: Arc<[u8]> = Arc::from(request.payload.as_slice());

        let mut snapshot = self.monitor.current().await;
        let mut candidates: VecDeque<CandidateTier> = self.router.route(request, &snapshot).into();
        let mut tracker = StateTracker::new(request.id);
        let mut attempted: Vec<Tier> = Vec::new();
        let mut attempt: u32 = 0;

        while attempt < request.max_retries {
            let Some(candidate) = candidates.pop_front() else {
                break;
            };
            if cancel.is_cancelled() {
                tracker.advance(ExecutionState::Cancelled);
                return Err(RoutingError::Cancelled);
            }

            attempt += 1;
            attempted.push(candidate.tier);
            tracker.advance(ExecutionState::Executing {
                tier: candidate.tier,
                attempt,
            });

            let job = Attempt::for_candidate(
                &candidate,
                request.id,
                attempt,
                &payload,
                request.attempt_timeout,
                &fingerprint,
            );
            let attempt_started = Instant::now();
            let mut task = job.spawn(
                self.backends.get(candidate.tier).map(Arc::clone),
                Arc::clone(&self.cache),
                Arc::clone(&self.recorder),
            );

            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.cancel_attempt(task, &candidate, request, attempt, attempt_started).await;
                    tracker.advance(ExecutionState::Cancelled);
                    return Err(RoutingError::Cancelled);
                }
                joined = &mut task => joined,
            };

            let error = match joined {
                Ok(Ok(AttemptOutput { output, latency_ms })) => {
                    tracker.advance(ExecutionState::Succeeded);
                    tracing::info!(
                        request_id = %request.id,
                        tier = %candidate.tier,
                        attempt,
                        latency_ms,
                        "Request served"
                    );
                    return Ok(InferenceResult {
                        request_id: request.id,
                        output,
                        tier_used: candidate.tier,
                        latency_ms,
                        stale: false,
                        attempted_tiers: attempted,
                    });
                }
                Ok(Err(error)) => error,
                Err(join_error) => RoutingError::AttemptError {
                    tier: candidate.tier,
                    message: join_error.to_string(),
                },
            };

            tracing::warn!(
                request_id = %request.id,
                tier = %candidate.tier,
                attempt,
                %error,
                "Attempt failed"
            );

            if !error.is_retryable() || attempt >= request.max_retries {
                break;
            }

            if error.triggers_reroute() {
                snapshot = self.monitor.refresh_since(&snapshot).await;
                candidates = self
                    .router
                    .route_excluding(request, &snapshot, &attempted)
                    .into();
            }

            if !candidates.is_empty() {
                tracker.advance(ExecutionState::Retrying {
                    failed: candidate.tier,
                });
            }
        }

        self.fall_back_to_cache(request, &fingerprint, attempted, started, &mut tracker)
    }

    async fn cancel_attempt(
        &self,
        task: JoinHandle<Result<AttemptOutput>>,
        candidate: &CandidateTier,
        request: &InferenceRequest,
        attempt: u32,
        attempt_started: Instant,
    ) {
        if candidate.tier.is_remote() {
            // Dropping the handle detaches the task; it still records and caches.
            tracing::info!(
                request_id = %request.id,
                attempt,
                "Request cancelled; remote attempt left to finish in background"
            );
            drop(task);
            return;
        }

        task.abort();
        match task.await {
            Err(join_error) if join_error.is_cancelled() => {
                let outcome = ExecutionOutcome::new(
                    request.id,
                    attempt,
                    candidate.tier,
                    candidate.variant.id.as_str(),
                )
                .with_failure(FailureKind::Cancelled)
                .with_latency_ms(attempt_started.elapsed().as_millis() as u64);
                self.recorder.record(outcome);
            }
            // The attempt finished before the abort landed and already recorded itself.
            Ok(_) | Err(_) => {}
        }
        tracing::info!(
            request_id = %request.id,
            tier = %candidate.tier,
            attempt,
            "Request cancelled; local attempt aborted"
        );
    }

    fn fall_back_to_cache(
        &self,
        request: &InferenceRequest,
        fingerprint: &Fingerprint,
        attempted: Vec<Tier>,
        started: Instant,
        tracker: &mut StateTracker,
    ) -> Result<InferenceResult> {
        tracker.advance(ExecutionState::Exhausted);
        tracker.advance(ExecutionState::CacheLookup);

        if let Some(entry) = self.cache.get(fingerprint) {
            tracker.advance(ExecutionState::SucceededStale);
            self.recorder.record_stale_served();
            tracing::warn!(
                request_id = %request.id,
                tier = %entry.tier,
                age_ms = entry.age().as_millis() as u64,
                "All tiers failed; serving stale cached result"
            );
            return Ok(InferenceResult {
                request_id: request.id,
                output: entry.output,
                tier_used: entry.tier,
                latency_ms: started.elapsed().as_millis() as u64,
                stale: true,
                attempted_tiers: attempted,
            });
        }

        tracker.advance(ExecutionState::Failed);
        self.recorder.record_exhausted();
        tracing::warn!(
            request_id = %request.id,
            attempted = ?attempted,
            cache_enabled = self.cache.is_enabled(),
            "All tiers failed and nothing cached"
        );
        Err(RoutingError::Exhausted {
            request_id: request.id,
            attempted,
        })
    }

    fn validate(&self, request: &InferenceRequest) -> Result<()> {
        let problem = if request.model.trim().is_empty() {
            Some("model name is empty".to_owned())
        } else if !(1..=10).contains(&request.priority) {
            Some(format!("priority {} is outside 1-10", request.priority))
        } else if request.max_retries == 0 {
            Some("maximum retry count must be at least 1".to_owned())
        } else if request.attempt_timeout.is_zero() {
            Some("per-attempt timeout must be non-zero".to_owned())
        } else if request
            .min_accuracy
            .is_some_and(|min_accuracy| !(0.0..=1.0).contains(&min_accuracy))
        {
            Some("minimum accuracy must be within [0, 1]".to_owned())
        } else if !self.router.registry().supports(&request.model) {
            Some(format!("unknown model '{}'", request.model))
        } else {
            None
        };

        match problem {
            Some(reason) => {
                tracing::warn!(request_id = %request.id, %reason, "Rejecting request");
                Err(RoutingError::InvalidRequest(reason))
            }
            None => Ok(()),
        }
    }
}
