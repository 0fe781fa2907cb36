//! Multi-factor tier scoring.

use serde::Serialize;
use tiercast_core::{LatencyClass, ModelVariant, ScoringConfig, Tier, TierStatus};

/// Weighted terms behind one tier's score, kept for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// Latency-class match in `[0, 1]`
    pub latency: f64,
    /// Load headroom in `[0, 1]`
    pub headroom: f64,
    /// Cost term in `[0, 1]`, always `1.0` for local tiers
    pub cost: f64,
    /// Tier-affinity bonus
    pub affinity: f64,
    /// Weighted sum clamped to `[0, 1]`
    pub total: f64,
}

/// Scores a tier for a request given the selected variant and current status.
#[derive(Debug, Clone)]
pub struct TierScorer {
    config: ScoringConfig,
}

impl TierScorer {
    /// Create a scorer with the given weights.
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Scoring configuration in use.
    #[must_use]
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score `tier` for a request of `latency_class`.
    #[must_use]
    pub fn score(
        &self,
        tier: Tier,
        variant: &ModelVariant,
        status: &TierStatus,
        latency_class: LatencyClass,
    ) -> ScoreBreakdown {
        let latency = self.latency_credit(variant.expected_latency_ms, latency_class);
        let headroom = (1.0 - status.load).clamp(0.0, 1.0);
        let cost = self.cost_term(tier, status.cost_per_request);
        let affinity = self.config.affinity.for_tier(tier);

        let weighted = self.config.latency_weight * latency
            + self.config.headroom_weight * headroom
            + self.config.cost_weight * cost
            + self.config.affinity_weight * affinity;

        ScoreBreakdown {
            latency,
            headroom,
            cost,
            affinity,
            total: if weighted.is_nan() {
                0.0
            } else {
                weighted.clamp(0.0, 1.0)
            },
        }
    }

    /// Full credit at or under the class ceiling, then linear decay reaching
    /// zero at `ceiling * (1 + latency_decay)`.
    fn latency_credit(&self, expected_ms: u64, latency_class: LatencyClass) -> f64 {
        let Some(ceiling_ms) = latency_class.ceiling_ms() else {
            return 1.0;
        };
        if expected_ms <= ceiling_ms {
            return 1.0;
        }
        let ceiling = ceiling_ms as f64;
        let overshoot = (expected_ms - ceiling_ms) as f64;
        (1.0 - overshoot / (ceiling * self.config.latency_decay)).max(0.0)
    }

    fn cost_term(&self, tier: Tier, cost_per_request: f64) -> f64 {
        if !tier.is_remote() {
            return 1.0;
        }
        (1.0 - cost_per_request / self.config.max_acceptable_cost).clamp(0.0, 1.0)
    }
}

impl Default for TierScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
