//! Per-attempt outcome recording and aggregation.
//!
//! Outcomes are written by the execution engine and never read back on the
//! routing path; the summary exists for observability consumers.

/// Outcome recording
pub mod recorder;
/// Aggregated summaries
pub mod summary;

pub use recorder::MetricsRecorder;
pub use summary::{MetricsSummary, TierSummary};
