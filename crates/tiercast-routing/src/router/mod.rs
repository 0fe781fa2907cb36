//! Turns a request and a resource snapshot into a ranked fallback chain.

/// Candidate ordering and the cost-preference tie-break
pub mod ranking;
/// Variant registry loaded from the catalog
pub mod registry;
/// Multi-factor tier scoring
pub mod scoring;
/// Per-tier variant selection
pub mod selector;

pub use ranking::{CandidateTier, rank};
pub use registry::VariantRegistry;
pub use scoring::{ScoreBreakdown, TierScorer};
pub use selector::{SelectionConstraints, VariantSelector};

use crate::RoutingError;
use std::sync::Arc;
use tiercast_core::{EngineConfig, InferenceRequest, LimitsConfig, ResourceSnapshot, Tier};

/// Scoring and routing engine.
pub struct TierRouter {
    registry: Arc<VariantRegistry>,
    selector: VariantSelector,
    scorer: TierScorer,
    limits: LimitsConfig,
}

impl TierRouter {
    /// Create a router over a variant registry.
    #[must_use]
    pub fn new(registry: Arc<VariantRegistry>, config: &EngineConfig) -> Self {
        Self {
            selector: VariantSelector::new(Arc::clone(&registry), config.selector.clone()),
            registry,
            scorer: TierScorer::new(config.scoring.clone()),
            limits: config.limits.clone(),
        }
    }

    /// Rank every eligible tier for the request, best first.
    ///
    /// A tier is eligible when the snapshot marks it available and the
    /// selector finds a fitting variant. An empty list means no tier can take
    /// the request right now.
    pub fn route(&self, request: &InferenceRequest, snapshot: &ResourceSnapshot) -> Vec<CandidateTier> {
        self.route_excluding(request, snapshot, &[])
    }

    /// Like [`TierRouter::route`], skipping the listed tiers.
    pub fn route_excluding(
        &self,
        request: &InferenceRequest,
        snapshot: &ResourceSnapshot,
        excluded: &[Tier],
    ) -> Vec<CandidateTier> {
        let mut candidates = Vec::with_capacity(Tier::ALL.len());

        for tier in Tier::ALL {
            if excluded.contains(&tier) {
                continue;
            }
            let status = snapshot.status(tier);
            if !status.available {
                tracing::trace!(%tier, "Skipping unavailable tier");
                continue;
            }

            let constraints = SelectionConstraints::for_request(request, &self.limits, tier);
            let variant = match self.selector.select(&request.model, tier, &constraints) {
                Ok(variant) => variant,
                Err(RoutingError::NoVariant { .. }) => {
                    tracing::trace!(%tier, model = %request.model, "No fitting variant");
                    continue;
                }
                Err(error) => {
                    tracing::warn!(%tier, %error, "Variant selection failed");
                    continue;
                }
            };

            let breakdown = self
                .scorer
                .score(tier, &variant, status, request.latency_class);
            candidates.push(CandidateTier {
                tier,
                variant,
                score: breakdown.total,
                breakdown,
                cost_per_request: status.cost_per_request,
            });
        }

        let ranked = rank(candidates, request.priority, self.scorer.config());

        if let Some(top) = ranked.first() {
            tracing::info!(
                request_id = %request.id,
                model = %request.model,
                tier = %top.tier,
                variant = %top.variant.id,
                score = top.score,
                candidates = ranked.len(),
                "Routing decision"
            );
        } else {
            tracing::info!(
                request_id = %request.id,
                model = %request.model,
                "No candidate tiers"
            );
        }

        ranked
    }

    /// Variant registry backing the router.
    #[must_use]
    pub fn registry(&self) -> &Arc<VariantRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiercast_core::{LatencyClass, ModelVariant, TierStatus};

    fn router() -> TierRouter {
        let registry = match VariantRegistry::from_variants([
            ModelVariant::new("m1-int4", "m1", Tier::LocalConstrained)
                .with_size(1000)
                .with_latency_ms(8),
            ModelVariant::new("m1-fp16", "m1", Tier::LocalMidtier)
                .with_size(3000)
                .with_latency_ms(50),
            ModelVariant::new("m1-fp32", "m1", Tier::Remote)
                .with_size(12_000)
                .with_latency_ms(80),
            ModelVariant::new("m2-fp32", "m2", Tier::Remote),
        ]) {
            Ok(registry) => registry,
            Err(error) => panic!("registry failed: {error}"),
        };
        TierRouter::new(Arc::new(registry), &EngineConfig::default())
    }

    fn scenario_snapshot() -> ResourceSnapshot {
        ResourceSnapshot::unavailable()
            .with_status(Tier::LocalMidtier, TierStatus::available(0.2))
            .with_status(Tier::Remote, TierStatus::available(0.0).with_cost(0.02))
    }

    fn tiers(candidates: &[CandidateTier]) -> Vec<Tier> {
        candidates.iter().map(|candidate| candidate.tier).collect()
    }

    #[test]
    fn test_midtier_ranks_first_when_remote_is_expensive() {
        let request = InferenceRequest::new("m1", b"input".to_vec())
            .with_latency_class(LatencyClass::NearRealTime)
            .with_priority(5);

        let candidates = router().route(&request, &scenario_snapshot());
        assert_eq!(tiers(&candidates), vec![Tier::LocalMidtier, Tier::Remote]);
        assert_eq!(candidates[0].variant.id, "m1-fp16");
        assert!(candidates[0].score > candidates[1].score);
        assert!((candidates[1].cost_per_request - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unavailable_tiers_yield_empty_route() {
        let request = InferenceRequest::new("m1", Vec::new());
        let candidates = router().route(&request, &ResourceSnapshot::unavailable());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_tiers_without_variants_are_skipped() {
        let request = InferenceRequest::new("m2", Vec::new());
        let snapshot = ResourceSnapshot::unavailable()
            .with_status(Tier::LocalConstrained, TierStatus::available(0.0))
            .with_status(Tier::LocalMidtier, TierStatus::available(0.0));
        assert!(router().route(&request, &snapshot).is_empty());

        let with_remote = snapshot.with_status(Tier::Remote, TierStatus::available(0.0));
        assert_eq!(tiers(&router().route(&request, &with_remote)), vec![Tier::Remote]);
    }

    #[test]
    fn test_excluded_tiers_are_skipped() {
        let request = InferenceRequest::new("m1", Vec::new());
        let candidates =
            router().route_excluding(&request, &scenario_snapshot(), &[Tier::LocalMidtier]);
        assert_eq!(tiers(&candidates), vec![Tier::Remote]);
    }

    #[test]
    fn test_route_is_score_descending_without_promotion() {
        let request = InferenceRequest::new("m1", Vec::new()).with_priority(10);
        let snapshot = ResourceSnapshot::unavailable()
            .with_status(Tier::LocalConstrained, TierStatus::available(0.9))
            .with_status(Tier::LocalMidtier, TierStatus::available(0.5))
            .with_status(Tier::Remote, TierStatus::available(0.0));

        let candidates = router().route(&request, &snapshot);
        assert_eq!(candidates.len(), 3);
        assert!(
            candidates
                .windows(2)
                .all(|pair| pair[0].score >= pair[1].score)
        );
    }
}
