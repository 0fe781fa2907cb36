use std::result::Result as StdResult;
use thiserror::Error;
use tiercast_core::{Error as CoreError, RequestId, Tier};

/// Result type for routing and execution.
pub type Result<T> = StdResult<T, RoutingError>;

/// Errors raised while routing and executing a request.
///
/// Only [`RoutingError::Exhausted`], [`RoutingError::InvalidRequest`], and
/// [`RoutingError::Cancelled`] ever leave the execution engine; every other
/// variant is recovered by the fallback loop.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Core library failure (catalog or configuration).
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The tier is down.
    #[error("Tier {0} is unavailable")]
    TierUnavailable(Tier),

    /// No variant of the model fits the tier.
    #[error("No variant of model '{model}' registered for tier {tier}")]
    NoVariant {
        /// Logical model name
        model: String,
        /// Tier without a fitting variant
        tier: Tier,
    },

    /// An attempt exceeded its per-attempt budget.
    #[error("Attempt on {tier} timed out after {timeout_ms}ms")]
    AttemptTimeout {
        /// Tier attempted
        tier: Tier,
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// The tier returned an application-level error.
    #[error("Attempt on {tier} failed: {message}")]
    AttemptError {
        /// Tier attempted
        tier: Tier,
        /// Executor's error message
        message: String,
    },

    /// Every candidate failed and the fallback cache had nothing to serve.
    #[error("All candidate tiers exhausted for request {request_id} (attempted: {attempted:?})")]
    Exhausted {
        /// Request that failed
        request_id: RequestId,
        /// Tiers attempted, in order
        attempted: Vec<Tier>,
    },

    /// The request was malformed or names an unknown model.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,
}

impl RoutingError {
    /// Whether the fallback loop may move on to another candidate.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TierUnavailable(_) | Self::AttemptTimeout { .. } | Self::AttemptError { .. }
        )
    }

    /// Whether the failure warrants a fresh resource snapshot before retrying.
    #[must_use]
    pub fn triggers_reroute(&self) -> bool {
        matches!(self, Self::TierUnavailable(_))
    }

    /// Whether this error is surfaced to callers of the engine.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. } | Self::InvalidRequest(_) | Self::Cancelled
        )
    }

    /// Tier the failure is attributed to, if any.
    #[must_use]
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::TierUnavailable(tier)
            | Self::NoVariant { tier, .. }
            | Self::AttemptTimeout { tier, .. }
            | Self::AttemptError { tier, .. } => Some(*tier),
            Self::Core(_) | Self::Exhausted { .. } | Self::InvalidRequest(_) | Self::Cancelled => {
                None
            }
        }
    }
}
