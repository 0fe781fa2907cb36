//! Candidate ordering with the cost-preference tie-break.

use super::scoring::ScoreBreakdown;
use serde::Serialize;
use std::cmp::Ordering;
use tiercast_core::{ModelVariant, ScoringConfig, Tier};

/// One entry in a request's fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateTier {
    /// Tier to execute on
    pub tier: Tier,
    /// Variant selected for the tier
    pub variant: ModelVariant,
    /// Score in `[0, 1]`
    pub score: f64,
    /// Terms that produced the score
    pub breakdown: ScoreBreakdown,
    /// Snapshot cost estimate, charged if the attempt reaches the tier
    pub cost_per_request: f64,
}

/// Order candidates best first.
///
/// Candidates are sorted by descending score, equal scores falling back to
/// the cheaper tier. When the remote tier ends up first, the runner-up is
/// local, and its score is at least `tie_break_fraction` of the top score,
/// the runner-up is promoted. Requests at or above `priority_override` keep
/// the raw order.
pub fn rank(
    mut candidates: Vec<CandidateTier>,
    priority: u8,
    config: &ScoringConfig,
) -> Vec<CandidateTier> {
    candidates.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.tier.cmp(&right.tier))
    });

    if priority >= config.priority_override {
        return candidates;
    }

    let promote = match candidates.as_slice() {
        [top, runner_up, ..] => {
            top.tier.is_remote()
                && !runner_up.tier.is_remote()
                && within_band(runner_up.score, top.score, config.tie_break_fraction)
        }
        _ => false,
    };
    if promote {
        tracing::debug!(
            promoted = %candidates[1].tier,
            runner_up_score = candidates[1].score,
            top_score = candidates[0].score,
            "Promoting local tier over remote"
        );
        candidates.swap(0, 1);
    }

    candidates
}

fn within_band(runner_up: f64, top: f64, fraction: f64) -> bool {
    matches!(
        runner_up.partial_cmp(&(top * fraction)),
        Some(Ordering::Greater | Ordering::Equal)
    )
}
