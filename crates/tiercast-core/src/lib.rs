//! Core types and traits for the tiercast hybrid inference engine.
//!
//! This crate provides the shared data model, error handling, configuration,
//! and the collaborator traits (tier executors, variant catalogs, telemetry
//! sinks) used across the tiercast workspace.

/// Engine configuration loaded from TOML.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Lock helpers that ignore poisoning.
pub mod sync;
/// Trait definitions for external collaborators.
pub mod traits;
/// Core data types for requests, variants, snapshots, and outcomes.
pub mod types;

pub use config::{
    CacheConfig, EngineConfig, LimitsConfig, MetricsConfig, MonitorConfig, ScoringConfig,
    SelectorConfig, TierAffinity,
};
pub use error::{Error, Result, TierError};
pub use sync::{IgnoreLock, IgnoreRwLock};
pub use traits::{ChannelSink, TelemetrySink, TierExecutor, VariantCatalog};
pub use types::{
    ExecutionOutcome, FailureKind, Fingerprint, InferenceRequest, InferenceResult, LatencyClass,
    ModelVariant, Precision, RequestId, ResourceSnapshot, Tier, TierHealth, TierStatus,
};
