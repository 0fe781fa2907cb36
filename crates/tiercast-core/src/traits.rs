use core::result::Result as CoreResult;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::{ExecutionOutcome, ModelVariant, Result, Tier, TierError, TierHealth};

/// Uniform interface over one compute tier.
///
/// Implementations must honor the timeout they are given and must tolerate
/// being called more than once for the same input, since a fallback can
/// re-dispatch a request.
#[async_trait]
pub trait TierExecutor: Send + Sync {
    /// Tier this executor serves.
    fn tier(&self) -> Tier;

    /// Run a variant on the given payload.
    ///
    /// # Errors
    ///
    /// Returns [`TierError::Timeout`] when the budget is exceeded,
    /// [`TierError::Unavailable`] when the tier is down, and
    /// [`TierError::Failed`] for application errors.
    async fn invoke(
        &self,
        variant_id: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> CoreResult<Vec<u8>, TierError>;

    /// Report availability and load.
    ///
    /// # Errors
    ///
    /// Returns an error when the health endpoint cannot be reached.
    async fn healthcheck(&self, timeout: Duration) -> CoreResult<TierHealth, TierError>;

    /// Estimated marginal cost of one request, zero for local tiers.
    fn estimate_cost(&self) -> f64 {
        0.0
    }
}

/// Read-only registry of deployable model variants.
pub trait VariantCatalog: Send + Sync {
    /// Logical model names known to the catalog.
    fn models(&self) -> Vec<String>;

    /// All variants registered for a logical model.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn list_variants(&self, model: &str) -> Result<Vec<ModelVariant>>;
}

/// Write-only destination for execution outcomes.
pub trait TelemetrySink: Send + Sync {
    /// Hand an outcome to the sink without waiting for acknowledgement.
    fn publish(&self, outcome: &ExecutionOutcome);
}

/// Telemetry sink that forwards outcomes over an unbounded channel.
pub struct ChannelSink {
    sender: UnboundedSender<ExecutionOutcome>,
}

impl ChannelSink {
    /// Create a sink feeding the given channel.
    #[must_use]
    pub fn new(sender: UnboundedSender<ExecutionOutcome>) -> Self {
        Self { sender }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&self, outcome: &ExecutionOutcome) {
        if self.sender.send(outcome.clone()).is_err() {
            tracing::debug!("Telemetry receiver dropped; outcome discarded");
        }
    }
}
