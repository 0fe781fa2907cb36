//! Fixed table of tier executors, one slot per tier.

use std::sync::Arc;
use tiercast_core::{Tier, TierExecutor};

/// Executors for each configured tier.
///
/// A tier without an executor is treated as permanently unavailable.
#[derive(Clone, Default)]
pub struct TierBackends {
    executors: [Option<Arc<dyn TierExecutor>>; 3],
}

impl TierBackends {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an executor in the slot of the tier it reports.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn TierExecutor>) -> Self {
        let tier = executor.tier();
        self.executors[tier.index()] = Some(executor);
        self
    }

    /// Executor for a tier.
    #[must_use]
    pub fn get(&self, tier: Tier) -> Option<&Arc<dyn TierExecutor>> {
        self.executors[tier.index()].as_ref()
    }

    /// Configured tiers with their executors, cheapest first.
    pub fn configured(&self) -> impl Iterator<Item = (Tier, &Arc<dyn TierExecutor>)> {
        Tier::ALL
            .into_iter()
            .filter_map(|tier| self.get(tier).map(|executor| (tier, executor)))
    }

    /// Whether no tier has an executor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.iter().all(Option::is_none)
    }
}
