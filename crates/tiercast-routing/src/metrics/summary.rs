//! Aggregated view of recorded outcomes.

use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tiercast_core::Tier;

/// Per-tier aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    /// Tier name
    pub tier: Tier,
    /// Number of attempts
    pub count: u64,
    /// Attempts that produced output
    pub successes: u64,
    /// Attempts that failed, timed out, or were cancelled
    pub failures: u64,
    /// Average observed latency in milliseconds
    pub average_latency_ms: f64,
    /// Total cost for this tier
    pub total_cost: f64,
}

impl TierSummary {
    /// Fraction of attempts that succeeded, `0.0` with no attempts.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.successes as f64 / self.count as f64
        }
    }
}

/// Snapshot of the metrics recorder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// One entry per tier, cheapest first
    pub tiers: Vec<TierSummary>,
    /// Attempts across all tiers
    pub total_attempts: u64,
    /// Total cost across all tiers
    pub cumulative_cost: f64,
    /// Requests answered from the fallback cache
    pub stale_served: u64,
    /// Requests that failed with nothing cached
    pub exhausted: u64,
}

impl MetricsSummary {
    /// Aggregate for one tier.
    #[must_use]
    pub fn tier(&self, tier: Tier) -> Option<&TierSummary> {
        self.tiers.iter().find(|summary| summary.tier == tier)
    }

    /// Attempts recorded for one tier.
    #[must_use]
    pub fn count(&self, tier: Tier) -> u64 {
        self.tier(tier).map_or(0, |summary| summary.count)
    }
}

impl Display for MetricsSummary {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        writeln!(formatter, "Total Attempts: {}", self.total_attempts)?;
        writeln!(formatter, "Cumulative Cost: ${:.4}", self.cumulative_cost)?;
        writeln!(formatter, "Stale Served: {}", self.stale_served)?;
        writeln!(formatter, "Exhausted: {}", self.exhausted)?;
        writeln!(formatter, "\nTier Distribution:")?;
        for tier in &self.tiers {
            writeln!(
                formatter,
                "  {}: {} attempts ({:.1}% ok) - {:.1}ms avg - ${:.4}",
                tier.tier,
                tier.count,
                tier.success_rate() * 100.0,
                tier.average_latency_ms,
                tier.total_cost
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_summary() {
        let summary = MetricsSummary {
            tiers: vec![TierSummary {
                tier: Tier::Remote,
                count: 4,
                successes: 3,
                failures: 1,
                average_latency_ms: 120.0,
                total_cost: 0.08,
            }],
            total_attempts: 4,
            cumulative_cost: 0.08,
            stale_served: 1,
            exhausted: 0,
        };

        let formatted = summary.to_string();
        assert!(formatted.contains("Total Attempts: 4"));
        assert!(formatted.contains("remote: 4 attempts (75.0% ok)"));
        assert_eq!(summary.count(Tier::Remote), 4);
        assert_eq!(summary.count(Tier::LocalMidtier), 0);
    }
}
