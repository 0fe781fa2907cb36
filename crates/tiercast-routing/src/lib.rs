//! Routing and execution for the tiercast hybrid inference engine.
//!
//! Requests are scored against a live view of three compute tiers, executed
//! on the best one, retried down a ranked fallback chain, and answered from a
//! stale-tolerant cache when every tier fails.

/// Per-tier executor table
pub mod backends;
/// Fallback cache
pub mod cache;
/// Execution engine and request state machine
pub mod engine;
/// Routing error taxonomy
pub mod error;
/// Outcome recording and summaries
pub mod metrics;
/// Resource monitor and background polling
pub mod monitor;
/// Variant registry, selection, scoring, and ranking
pub mod router;

pub use backends::TierBackends;
pub use cache::{CacheEntry, CacheStats, FallbackCache};
pub use engine::{ExecutionEngine, ExecutionState, StateTracker};
pub use error::{Result, RoutingError};
pub use metrics::{MetricsRecorder, MetricsSummary, TierSummary};
pub use monitor::{PollerHandle, ResourceMonitor};
pub use router::{
    CandidateTier, ScoreBreakdown, SelectionConstraints, TierRouter, TierScorer, VariantRegistry,
    VariantSelector, rank,
};
