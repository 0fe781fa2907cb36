use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{Error, Result};

/// Unique identifier for an inference request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

/// Compute tier that can serve an inference request.
///
/// The set is closed: every tier is known at compile time and ordered from
/// cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Resource-constrained local accelerator
    LocalConstrained,
    /// Mid-tier local accelerator
    LocalMidtier,
    /// Remote elastic compute
    Remote,
}

impl Tier {
    /// All tiers, cheapest first.
    pub const ALL: [Self; 3] = [Self::LocalConstrained, Self::LocalMidtier, Self::Remote];

    /// Stable position of this tier inside [`Tier::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::LocalConstrained => 0,
            Self::LocalMidtier => 1,
            Self::Remote => 2,
        }
    }

    /// Whether this tier carries a marginal per-request cost.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::Remote)
    }

    /// Short display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LocalConstrained => "local-constrained",
            Self::LocalMidtier => "local-midtier",
            Self::Remote => "remote",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(self.name())
    }
}

/// Service-level latency bucket attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyClass {
    /// Under 10ms
    RealTime,
    /// Under 100ms
    NearRealTime,
    /// Under 500ms
    Interactive,
    /// Over one second, no ceiling
    Batch,
}

impl LatencyClass {
    /// Latency ceiling in milliseconds, `None` for batch work.
    #[must_use]
    pub const fn ceiling_ms(self) -> Option<u64> {
        match self {
            Self::RealTime => Some(10),
            Self::NearRealTime => Some(100),
            Self::Interactive => Some(500),
            Self::Batch => None,
        }
    }
}

/// Numeric precision of a deployable variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// 32-bit float
    #[default]
    Fp32,
    /// 16-bit float
    Fp16,
    /// bfloat16
    Bf16,
    /// 8-bit integer quantization
    Int8,
    /// 4-bit integer quantization
    Int4,
}

/// One deployable form of a logical model targeted at a single tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Variant identifier passed to the tier executor
    pub id: String,
    /// Owning logical model name
    pub model: String,
    /// Tier this variant runs on
    pub tier: Tier,
    /// Size in size units
    pub size: u64,
    /// Expected latency in milliseconds
    pub expected_latency_ms: u64,
    /// Measured accuracy in `[0, 1]`
    pub accuracy: f64,
    /// Numeric precision class
    #[serde(default)]
    pub precision: Precision,
}

impl ModelVariant {
    /// Create a variant with zero size, zero latency, and full accuracy.
    pub fn new(id: impl Into<String>, model: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            tier,
            size: 0,
            expected_latency_ms: 0,
            accuracy: 1.0,
            precision: Precision::default(),
        }
    }

    /// Set the size.
    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the expected latency.
    #[must_use]
    pub fn with_latency_ms(mut self, expected_latency_ms: u64) -> Self {
        self.expected_latency_ms = expected_latency_ms;
        self
    }

    /// Set the measured accuracy.
    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Set the precision class.
    #[must_use]
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Check the variant's invariants.
    ///
    /// # Errors
    /// Returns [`Error::InvalidVariant`] for empty identifiers or an accuracy
    /// outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidVariant(format!(
                "variant of model '{}' has an empty id",
                self.model
            )));
        }
        if self.model.trim().is_empty() {
            return Err(Error::InvalidVariant(format!(
                "variant '{}' has no owning model",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.accuracy) {
            return Err(Error::InvalidVariant(format!(
                "variant '{}' accuracy {} is outside [0, 1]",
                self.id, self.accuracy
            )));
        }
        Ok(())
    }
}

/// Deterministic cache key over (logical model, payload).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash a model name and payload into a fingerprint.
    pub fn of(model: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update([0_u8]);
        hasher.update(payload);
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        formatter.write_str(&self.0)
    }
}

/// Immutable inference request created at the ingress boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Unique request identifier
    pub id: RequestId,
    /// Logical model name
    pub model: String,
    /// Opaque input payload
    pub payload: Vec<u8>,
    /// Latency service level
    pub latency_class: LatencyClass,
    /// Priority from 1 to 10, 10 highest
    pub priority: u8,
    /// Attempts allowed in total, first attempt included
    pub max_retries: u32,
    /// Budget for each individual attempt
    pub attempt_timeout: Duration,
    /// Lowest acceptable variant accuracy
    pub min_accuracy: Option<f64>,
    /// Caller-supplied metadata
    pub metadata: HashMap<String, String>,
}

impl InferenceRequest {
    /// Default number of attempts.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default per-attempt timeout.
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Create a request with interactive latency and priority 5.
    pub fn new(model: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: RequestId::new(),
            model: model.into(),
            payload: payload.into(),
            latency_class: LatencyClass::Interactive,
            priority: 5,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
            min_accuracy: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the latency class.
    #[must_use]
    pub fn with_latency_class(mut self, latency_class: LatencyClass) -> Self {
        self.latency_class = latency_class;
        self
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the total attempt budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Require a minimum variant accuracy.
    #[must_use]
    pub fn with_min_accuracy(mut self, min_accuracy: f64) -> Self {
        self.min_accuracy = Some(min_accuracy);
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Cache key for this request.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.model, &self.payload)
    }

    /// Upper bound on wall-clock time spent on attempts.
    pub fn wall_clock_budget(&self) -> Duration {
        self.attempt_timeout.saturating_mul(self.max_retries)
    }
}

/// Reply from a tier health check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierHealth {
    /// Whether the tier accepts work
    pub available: bool,
    /// Load fraction in `[0, 1]`
    pub load: f64,
}

impl TierHealth {
    /// Build a health reply, clamping load into `[0, 1]`.
    #[must_use]
    pub fn new(available: bool, load: f64) -> Self {
        Self {
            available,
            load: clamp_unit(load),
        }
    }
}

/// Availability and load of one tier within a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierStatus {
    /// Whether the tier accepts work
    pub available: bool,
    /// Load fraction in `[0, 1]`
    pub load: f64,
    /// Estimated cost per request, only non-zero for the remote tier
    pub cost_per_request: f64,
}

impl TierStatus {
    /// A tier that is down.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            available: false,
            load: 1.0,
            cost_per_request: 0.0,
        }
    }

    /// An available tier at the given load.
    #[must_use]
    pub fn available(load: f64) -> Self {
        Self {
            available: true,
            load: clamp_unit(load),
            cost_per_request: 0.0,
        }
    }

    /// Set the per-request cost estimate.
    #[must_use]
    pub fn with_cost(mut self, cost_per_request: f64) -> Self {
        self.cost_per_request = cost_per_request.max(0.0);
        self
    }
}

/// Point-in-time view of every tier's availability and load.
///
/// Snapshots are never mutated after construction; the resource monitor
/// publishes a new one instead.
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    tiers: [TierStatus; 3],
    captured_at: Instant,
    initial: bool,
}

impl ResourceSnapshot {
    /// Snapshot with every tier unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            tiers: [TierStatus::unavailable(); 3],
            captured_at: Instant::now(),
            initial: false,
        }
    }

    /// Placeholder published before the first poll completes.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            initial: true,
            ..Self::unavailable()
        }
    }

    /// Return a copy with one tier's status replaced.
    #[must_use]
    pub fn with_status(mut self, tier: Tier, status: TierStatus) -> Self {
        self.tiers[tier.index()] = status;
        self.initial = false;
        self
    }

    /// Status of a tier.
    #[must_use]
    pub fn status(&self, tier: Tier) -> &TierStatus {
        &self.tiers[tier.index()]
    }

    /// Whether a tier is marked available.
    #[must_use]
    pub fn is_available(&self, tier: Tier) -> bool {
        self.status(tier).available
    }

    /// Whether any tier is available.
    #[must_use]
    pub fn any_available(&self) -> bool {
        self.tiers.iter().any(|status| status.available)
    }

    /// When the snapshot was captured.
    #[must_use]
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Time elapsed since capture.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Whether this is the placeholder published before the first poll.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.initial
    }
}

/// Answer returned to the caller of `submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Request this result answers
    pub request_id: RequestId,
    /// Output payload
    pub output: Vec<u8>,
    /// Tier that produced the output
    pub tier_used: Tier,
    /// Latency of the producing attempt, or of the whole request when stale
    pub latency_ms: u64,
    /// Served from the fallback cache after every live tier failed
    pub stale: bool,
    /// Tiers attempted, in order
    pub attempted_tiers: Vec<Tier>,
}

/// Why an attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Exceeded its per-attempt budget
    Timeout,
    /// Executor returned an application error
    Error,
    /// Tier was down
    Unavailable,
    /// Caller cancelled the request
    Cancelled,
}

/// Record of a single execution attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Request the attempt belongs to
    pub request_id: RequestId,
    /// 1-based attempt number
    pub attempt: u32,
    /// Tier attempted
    pub tier: Tier,
    /// Variant invoked
    pub variant_id: String,
    /// Whether the attempt produced output
    pub success: bool,
    /// Failure classification, `None` on success
    pub failure: Option<FailureKind>,
    /// Observed latency in milliseconds
    pub latency_ms: u64,
    /// Cost incurred
    pub cost: f64,
    /// When the attempt finished
    pub timestamp: SystemTime,
}

impl ExecutionOutcome {
    /// Create a successful outcome with zero latency and cost.
    pub fn new(
        request_id: RequestId,
        attempt: u32,
        tier: Tier,
        variant_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            attempt,
            tier,
            variant_id: variant_id.into(),
            success: true,
            failure: None,
            latency_ms: 0,
            cost: 0.0,
            timestamp: SystemTime::now(),
        }
    }

    /// Mark the attempt as failed.
    #[must_use]
    pub fn with_failure(mut self, kind: FailureKind) -> Self {
        self.success = false;
        self.failure = Some(kind);
        self
    }

    /// Set the observed latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set the cost incurred.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order_and_index() {
        for (position, tier) in Tier::ALL.iter().enumerate() {
            assert_eq!(tier.index(), position);
        }
        assert!(Tier::LocalConstrained < Tier::Remote);
        assert!(Tier::Remote.is_remote());
        assert!(!Tier::LocalMidtier.is_remote());
        assert_eq!(Tier::LocalMidtier.to_string(), "local-midtier");
    }

    #[test]
    fn test_latency_class_ceilings() {
        assert_eq!(LatencyClass::RealTime.ceiling_ms(), Some(10));
        assert_eq!(LatencyClass::NearRealTime.ceiling_ms(), Some(100));
        assert_eq!(LatencyClass::Interactive.ceiling_ms(), Some(500));
        assert_eq!(LatencyClass::Batch.ceiling_ms(), None);
        assert!(LatencyClass::RealTime < LatencyClass::Batch);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let first = Fingerprint::of("m1", b"hello");
        let second = Fingerprint::of("m1", b"hello");
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);

        assert_ne!(first, Fingerprint::of("m2", b"hello"));
        assert_ne!(first, Fingerprint::of("m1", b"hellO"));
        // The separator keeps ("ab", "c") and ("a", "bc") apart.
        assert_ne!(Fingerprint::of("ab", b"c"), Fingerprint::of("a", b"bc"));
    }

    #[test]
    fn test_request_builder_and_budget() {
        let request = InferenceRequest::new("m1", b"input".to_vec())
            .with_priority(9)
            .with_max_retries(4)
            .with_attempt_timeout(Duration::from_millis(250))
            .with_metadata("caller", "tests");
        assert_eq!(request.priority, 9);
        assert_eq!(request.wall_clock_budget(), Duration::from_secs(1));
        assert_eq!(request.metadata.get("caller").map(String::as_str), Some("tests"));
        assert_eq!(request.fingerprint(), Fingerprint::of("m1", b"input"));
    }

    #[test]
    fn test_variant_validation() {
        let valid = ModelVariant::new("m1-int8", "m1", Tier::LocalConstrained).with_accuracy(0.8);
        assert!(valid.validate().is_ok());

        let bad_accuracy = valid.clone().with_accuracy(1.5);
        assert!(matches!(
            bad_accuracy.validate(),
            Err(Error::InvalidVariant(_))
        ));

        let no_id = ModelVariant::new(" ", "m1", Tier::Remote);
        assert!(no_id.validate().is_err());
    }

    #[test]
    fn test_snapshot_with_status() {
        let snapshot = ResourceSnapshot::initial();
        assert!(snapshot.is_initial());
        assert!(!snapshot.any_available());

        let updated = snapshot.with_status(Tier::Remote, TierStatus::available(0.3).with_cost(0.02));
        assert!(!updated.is_initial());
        assert!(updated.is_available(Tier::Remote));
        assert!(!updated.is_available(Tier::LocalMidtier));
        assert!((updated.status(Tier::Remote).cost_per_request - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_load_is_clamped() {
        assert!((TierStatus::available(1.7).load - 1.0).abs() < f64::EPSILON);
        assert!(TierStatus::available(-0.2).load.abs() < f64::EPSILON);
        assert!((TierHealth::new(true, f64::NAN).load - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_outcome_builder() {
        let outcome = ExecutionOutcome::new(RequestId::new(), 2, Tier::Remote, "m1-fp16")
            .with_failure(FailureKind::Timeout)
            .with_latency_ms(120)
            .with_cost(0.0);
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(FailureKind::Timeout));
        assert_eq!(outcome.attempt, 2);
    }
}
