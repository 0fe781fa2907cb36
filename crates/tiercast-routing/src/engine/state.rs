//! Per-request fallback state machine.

use std::fmt::{Display, Formatter, Result as FmtResult};
use tiercast_core::{RequestId, Tier};

/// Where a request is in its execution lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Candidate list computed
    Routed,
    /// An attempt is in flight
    Executing {
        /// Tier being attempted
        tier: Tier,
        /// 1-based attempt number
        attempt: u32,
    },
    /// An attempt failed and another candidate will be tried
    Retrying {
        /// Tier that just failed
        failed: Tier,
    },
    /// No candidate or attempt budget left
    Exhausted,
    /// Consulting the fallback cache
    CacheLookup,
    /// A live tier answered
    Succeeded,
    /// Answered from the fallback cache
    SucceededStale,
    /// Nothing could answer
    Failed,
    /// The caller gave up
    Cancelled,
}

impl ExecutionState {
    /// Whether the machine may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Routed | Self::Retrying { .. },
                Self::Executing { .. } | Self::Exhausted | Self::Cancelled
            ) | (
                Self::Executing { .. },
                Self::Succeeded | Self::Retrying { .. } | Self::Exhausted | Self::Cancelled
            ) | (Self::Exhausted, Self::CacheLookup)
                | (Self::CacheLookup, Self::SucceededStale | Self::Failed)
        )
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::SucceededStale | Self::Failed | Self::Cancelled
        )
    }
}

impl Display for ExecutionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Routed => formatter.write_str("routed"),
            Self::Executing { tier, attempt } => write!(formatter, "executing({tier}, #{attempt})"),
            Self::Retrying { failed } => write!(formatter, "retrying(after {failed})"),
            Self::Exhausted => formatter.write_str("exhausted"),
            Self::CacheLookup => formatter.write_str("cache-lookup"),
            Self::Succeeded => formatter.write_str("succeeded"),
            Self::SucceededStale => formatter.write_str("succeeded-stale"),
            Self::Failed => formatter.write_str("failed"),
            Self::Cancelled => formatter.write_str("cancelled"),
        }
    }
}

/// Tracks and logs one request's state transitions.
#[derive(Debug)]
pub struct StateTracker {
    request_id: RequestId,
    history: Vec<ExecutionState>,
}

impl StateTracker {
    /// Start tracking a request that has just been routed.
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            history: vec![ExecutionState::Routed],
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.history
            .last()
            .copied()
            .unwrap_or(ExecutionState::Routed)
    }

    /// Every state visited, in order.
    #[must_use]
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    /// Move to `next`. Illegal transitions are logged and applied anyway.
    pub fn advance(&mut self, next: ExecutionState) {
        let current = self.state();
        if current.can_transition_to(&next) {
            tracing::debug!(
                request_id = %self.request_id,
                from = %current,
                to = %next,
                "State transition"
            );
        } else {
            tracing::warn!(
                request_id = %self.request_id,
                from = %current,
                to = %next,
                "Unexpected state transition"
            );
        }
        self.history.push(next);
    }
}
