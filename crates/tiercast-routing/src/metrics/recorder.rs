//! Fire-and-forget recording of execution outcomes.

use super::summary::{MetricsSummary, TierSummary};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tiercast_core::{
    ExecutionOutcome, IgnoreLock as _, MetricsConfig, RequestId, TelemetrySink, Tier,
};

#[derive(Debug, Clone, Copy, Default)]
struct TierTally {
    count: u64,
    successes: u64,
    failures: u64,
    total_latency_ms: u64,
    total_cost: f64,
}

#[derive(Default)]
struct RecorderState {
    tallies: [TierTally; 3],
    recent: VecDeque<ExecutionOutcome>,
    stale_served: u64,
    exhausted: u64,
}

/// Collects per-attempt outcomes and keeps running per-tier totals.
///
/// Recording only touches in-memory state. An attached [`TelemetrySink`] is
/// called after the internal lock is released.
pub struct MetricsRecorder {
    state: Mutex<RecorderState>,
    window: usize,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl MetricsRecorder {
    /// Creates a new recorder
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            state: Mutex::new(RecorderState::default()),
            window: config.window,
            sink: None,
        }
    }

    /// Forward every recorded outcome to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Records an attempt outcome
    pub fn record(&self, outcome: ExecutionOutcome) {
        {
            let mut state = self.state.lock_ignore_poison();
            let tally = &mut state.tallies[outcome.tier.index()];
            tally.count += 1;
            if outcome.success {
                tally.successes += 1;
            } else {
                tally.failures += 1;
            }
            tally.total_latency_ms = tally.total_latency_ms.saturating_add(outcome.latency_ms);
            tally.total_cost += outcome.cost;

            if self.window > 0 {
                if state.recent.len() == self.window {
                    state.recent.pop_front();
                }
                state.recent.push_back(outcome.clone());
            }
        }

        if let Some(sink) = &self.sink {
            sink.publish(&outcome);
        }
    }

    /// Count a request answered from the fallback cache.
    pub fn record_stale_served(&self) {
        self.state.lock_ignore_poison().stale_served += 1;
    }

    /// Count a request that failed with nothing cached.
    pub fn record_exhausted(&self) {
        self.state.lock_ignore_poison().exhausted += 1;
    }

    /// Per-tier counts, average latency, and cumulative cost.
    pub fn summary(&self) -> MetricsSummary {
        let state = self.state.lock_ignore_poison();
        let tiers: Vec<TierSummary> = Tier::ALL
            .into_iter()
            .map(|tier| {
                let tally = state.tallies[tier.index()];
                TierSummary {
                    tier,
                    count: tally.count,
                    successes: tally.successes,
                    failures: tally.failures,
                    average_latency_ms: if tally.count == 0 {
                        0.0
                    } else {
                        tally.total_latency_ms as f64 / tally.count as f64
                    },
                    total_cost: tally.total_cost,
                }
            })
            .collect();

        MetricsSummary {
            total_attempts: tiers.iter().map(|tier| tier.count).sum(),
            cumulative_cost: tiers.iter().map(|tier| tier.total_cost).sum(),
            tiers,
            stale_served: state.stale_served,
            exhausted: state.exhausted,
        }
    }

    /// Most recent outcomes, oldest first.
    pub fn recent(&self) -> Vec<ExecutionOutcome> {
        self.state.lock_ignore_poison().recent.iter().cloned().collect()
    }

    /// Outcomes in the rolling window that belong to one request, in attempt order.
    pub fn outcomes_for(&self, request_id: RequestId) -> Vec<ExecutionOutcome> {
        self.state
            .lock_ignore_poison()
            .recent
            .iter()
            .filter(|outcome| outcome.request_id == request_id)
            .cloned()
            .collect()
    }

    /// Returns the number of outcomes in the rolling window
    pub fn len(&self) -> usize {
        self.state.lock_ignore_poison().recent.len()
    }

    /// Returns whether the rolling window is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiercast_core::{ChannelSink, FailureKind};
    use tokio::sync::mpsc;

    fn outcome(request_id: RequestId, attempt: u32, tier: Tier) -> ExecutionOutcome {
        ExecutionOutcome::new(request_id, attempt, tier, format!("m1-{tier}"))
    }

    #[test]
    fn test_summary_empty() {
        let recorder = MetricsRecorder::default();
        let summary = recorder.summary();
        assert_eq!(summary.total_attempts, 0);
        assert_eq!(summary.tiers.len(), 3);
        assert!(summary.cumulative_cost.abs() < f64::EPSILON);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_summary_with_data() {
        let recorder = MetricsRecorder::default();
        let request_id = RequestId::new();

        recorder.record(
            outcome(request_id, 1, Tier::LocalMidtier)
                .with_failure(FailureKind::Timeout)
                .with_latency_ms(200),
        );
        recorder.record(
            outcome(request_id, 2, Tier::Remote)
                .with_latency_ms(100)
                .with_cost(0.02),
        );
        recorder.record(
            outcome(RequestId::new(), 1, Tier::Remote)
                .with_latency_ms(50)
                .with_cost(0.02),
        );

        let summary = recorder.summary();
        assert_eq!(summary.total_attempts, 3);
        assert!((summary.cumulative_cost - 0.04).abs() < 1e-9);

        let Some(remote) = summary.tier(Tier::Remote) else {
            panic!("remote tier missing");
        };
        assert_eq!(remote.count, 2);
        assert!((remote.average_latency_ms - 75.0).abs() < f64::EPSILON);

        let Some(midtier) = summary.tier(Tier::LocalMidtier) else {
            panic!("midtier missing");
        };
        assert_eq!(midtier.failures, 1);
        assert_eq!(summary.count(Tier::LocalConstrained), 0);

        let attempts: Vec<u32> = recorder
            .outcomes_for(request_id)
            .iter()
            .map(|outcome| outcome.attempt)
            .collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[test]
    fn test_window_is_bounded() {
        let recorder = MetricsRecorder::new(&MetricsConfig { window: 2 });
        let request_id = RequestId::new();
        for attempt in 1..=3 {
            recorder.record(outcome(request_id, attempt, Tier::Remote));
        }

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.recent()[0].attempt, 2);
        // Totals are not limited by the window.
        assert_eq!(recorder.summary().count(Tier::Remote), 3);
    }

    #[test]
    fn test_request_level_counters() {
        let recorder = MetricsRecorder::default();
        recorder.record_stale_served();
        recorder.record_exhausted();
        recorder.record_exhausted();

        let summary = recorder.summary();
        assert_eq!(summary.stale_served, 1);
        assert_eq!(summary.exhausted, 2);
    }

    #[test]
    fn test_outcomes_forwarded_to_sink() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let recorder = MetricsRecorder::default().with_sink(Arc::new(ChannelSink::new(sender)));

        let request_id = RequestId::new();
        recorder.record(outcome(request_id, 1, Tier::LocalConstrained));

        let Ok(forwarded) = receiver.try_recv() else {
            panic!("outcome not forwarded");
        };
        assert_eq!(forwarded.request_id, request_id);
        assert_eq!(forwarded.tier, Tier::LocalConstrained);
    }
}
