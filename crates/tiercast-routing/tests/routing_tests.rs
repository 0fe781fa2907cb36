//! Routing property tests
//!
//! Exercise the router across many resource snapshots and check ordering,
//! emptiness, tie-break, and priority-override guarantees.

#![cfg(test)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::min_ident_chars,
    clippy::missing_panics_doc,
    reason = "Test code is allowed to use expect/unwrap and doesn't need panic docs"
)]

use std::sync::Arc;
use tiercast_core::{
    EngineConfig, InferenceRequest, LatencyClass, ModelVariant, ResourceSnapshot, ScoringConfig,
    Tier, TierStatus,
};
use tiercast_routing::{CandidateTier, ScoreBreakdown, TierRouter, VariantRegistry, rank};

const LOADS: [f64; 3] = [0.0, 0.5, 1.0];
const COSTS: [f64; 3] = [0.0, 0.005, 0.05];
const CLASSES: [LatencyClass; 4] = [
    LatencyClass::RealTime,
    LatencyClass::NearRealTime,
    LatencyClass::Interactive,
    LatencyClass::Batch,
];

fn router() -> TierRouter {
    let registry = VariantRegistry::from_variants([
        ModelVariant::new("m1-int4", "m1", Tier::LocalConstrained)
            .with_size(900)
            .with_latency_ms(12),
        ModelVariant::new("m1-int8", "m1", Tier::LocalConstrained)
            .with_size(1800)
            .with_latency_ms(9)
            .with_accuracy(0.85),
        ModelVariant::new("m1-fp16", "m1", Tier::LocalMidtier)
            .with_size(3500)
            .with_latency_ms(60),
        ModelVariant::new("m1-fp32", "m1", Tier::Remote)
            .with_size(14_000)
            .with_latency_ms(150),
        ModelVariant::new("m2-fp32", "m2", Tier::Remote).with_latency_ms(300),
    ])
    .unwrap();
    TierRouter::new(Arc::new(registry), &EngineConfig::default())
}

/// Every combination of availability for the three tiers.
fn availability_masks() -> impl Iterator<Item = [bool; 3]> {
    (0_u8..8).map(|bits| [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0])
}

fn snapshot(mask: [bool; 3], load: f64, cost: f64) -> ResourceSnapshot {
    Tier::ALL
        .into_iter()
        .zip(mask)
        .fold(ResourceSnapshot::unavailable(), |snapshot, (tier, up)| {
            let status = if up {
                TierStatus::available(load).with_cost(if tier.is_remote() { cost } else { 0.0 })
            } else {
                TierStatus::unavailable()
            };
            snapshot.with_status(tier, status)
        })
}

#[test]
fn test_route_is_non_empty_whenever_a_tier_can_serve() {
    let router = router();
    for mask in availability_masks() {
        for load in LOADS {
            for cost in COSTS {
                for class in CLASSES {
                    let request = InferenceRequest::new("m1", b"x".to_vec())
                        .with_latency_class(class)
                        .with_priority(10);
                    let candidates = router.route(&request, &snapshot(mask, load, cost));

                    let expected = mask.iter().filter(|up| **up).count();
                    assert_eq!(candidates.len(), expected, "mask {mask:?}");
                    assert!(
                        candidates
                            .windows(2)
                            .all(|pair| pair[0].score >= pair[1].score),
                        "priority 10 must keep raw score order"
                    );
                    assert!(
                        candidates
                            .iter()
                            .all(|candidate| (0.0..=1.0).contains(&candidate.score))
                    );
                }
            }
        }
    }
}

#[test]
fn test_route_is_empty_when_no_tier_can_serve() {
    let router = router();
    let request = InferenceRequest::new("m1", b"x".to_vec());
    assert!(router.route(&request, &snapshot([false; 3], 0.0, 0.0)).is_empty());

    // m2 only has a remote variant.
    let request = InferenceRequest::new("m2", b"x".to_vec());
    assert!(
        router
            .route(&request, &snapshot([true, true, false], 0.0, 0.0))
            .is_empty()
    );
}

#[test]
fn test_constrained_tier_respects_size_limit() {
    let registry = VariantRegistry::from_variants([
        ModelVariant::new("m3-fp16", "m3", Tier::LocalConstrained).with_size(9000),
        ModelVariant::new("m3-fp16-mid", "m3", Tier::LocalMidtier).with_size(9000),
    ])
    .unwrap();
    let router = TierRouter::new(Arc::new(registry), &EngineConfig::default());
    let request = InferenceRequest::new("m3", b"x".to_vec());

    let candidates = router.route(&request, &snapshot([true; 3], 0.0, 0.0));
    let tiers: Vec<Tier> = candidates.iter().map(|candidate| candidate.tier).collect();
    assert_eq!(tiers, vec![Tier::LocalMidtier]);
}

fn candidate(tier: Tier, score: f64) -> CandidateTier {
    CandidateTier {
        tier,
        variant: ModelVariant::new(format!("v-{tier}"), "m1", tier),
        score,
        breakdown: ScoreBreakdown {
            latency: 0.0,
            headroom: 0.0,
            cost: 0.0,
            affinity: 0.0,
            total: score,
        },
        cost_per_request: 0.0,
    }
}

#[test]
fn test_tie_break_promotes_local_runner_up_for_normal_priority() {
    let config = ScoringConfig::default();
    for local in [Tier::LocalConstrained, Tier::LocalMidtier] {
        for priority in 1..config.priority_override {
            // Runner-up near the edge of, and well inside, the 70% band.
            for runner_up in [0.64, 0.7, 0.85] {
                let ranked = rank(
                    vec![candidate(Tier::Remote, 0.9), candidate(local, runner_up)],
                    priority,
                    &config,
                );
                assert_eq!(ranked[0].tier, local, "priority {priority}, score {runner_up}");
                assert_eq!(ranked[1].tier, Tier::Remote);
            }
        }
    }
}

#[test]
fn test_priority_override_preserves_raw_order() {
    let config = ScoringConfig::default();
    for priority in config.priority_override..=10 {
        let ranked = rank(
            vec![candidate(Tier::LocalMidtier, 0.7), candidate(Tier::Remote, 0.9)],
            priority,
            &config,
        );
        assert_eq!(ranked[0].tier, Tier::Remote);
        assert_eq!(ranked[1].tier, Tier::LocalMidtier);
    }
}

#[test]
fn test_tie_break_fraction_is_configurable() {
    let strict = ScoringConfig {
        tie_break_fraction: 0.9,
        ..ScoringConfig::default()
    };
    let ranked = rank(
        vec![candidate(Tier::Remote, 0.9), candidate(Tier::LocalMidtier, 0.7)],
        5,
        &strict,
    );
    assert_eq!(ranked[0].tier, Tier::Remote);
}
