//! Mock tier for testing routing and fallback behaviour.
//!
//! Each invocation consumes the next scripted [`MockBehavior`]; once the
//! script runs out the default behaviour applies. Every call is recorded so
//! tests can verify which variants were dispatched.

use async_trait::async_trait;
use core::result::Result as CoreResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiercast_core::{IgnoreLock as _, Tier, TierError, TierExecutor, TierHealth};
use tokio::time::sleep;

/// What a mock invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return the payload immediately
    Respond(Vec<u8>),
    /// Return the payload after a delay, timing out if the delay exceeds the budget
    Delay(Duration, Vec<u8>),
    /// Return an application error
    Fail(String),
    /// Report the tier as unavailable
    Unavailable,
    /// Never answer; times out once the budget elapses
    Hang,
}

/// What a mock health check does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthBehavior {
    /// Answer with the given health
    Report(TierHealth),
    /// Fail the health check
    Error,
    /// Never answer
    Hang,
}

/// Mutable state shared between clones of a mock tier
#[derive(Debug)]
struct MockState {
    script: VecDeque<MockBehavior>,
    fallback: MockBehavior,
    health: HealthBehavior,
    cost: f64,
    calls: Vec<String>,
    health_checks: usize,
}

/// Scriptable stand-in for a compute tier.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Clone, Debug)]
pub struct MockTier {
    tier: Tier,
    state: Arc<Mutex<MockState>>,
}

impl MockTier {
    /// Create a healthy, idle mock tier that echoes its payload.
    #[must_use]
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            state: Arc::new(Mutex::new(MockState {
                script: VecDeque::new(),
                fallback: MockBehavior::Respond(Vec::new()),
                health: HealthBehavior::Report(TierHealth::new(true, 0.0)),
                cost: 0.0,
                calls: Vec::new(),
                health_checks: 0,
            })),
        }
    }

    /// Set the response returned once the script is exhausted.
    #[must_use]
    pub fn with_default_response(self, output: impl Into<Vec<u8>>) -> Self {
        self.state.lock_ignore_poison().fallback = MockBehavior::Respond(output.into());
        self
    }

    /// Set the behaviour used once the script is exhausted.
    #[must_use]
    pub fn with_default_behavior(self, behavior: MockBehavior) -> Self {
        self.state.lock_ignore_poison().fallback = behavior;
        self
    }

    /// Queue behaviours for the next invocations.
    #[must_use]
    pub fn with_script(self, behaviors: impl IntoIterator<Item = MockBehavior>) -> Self {
        self.state.lock_ignore_poison().script.extend(behaviors);
        self
    }

    /// Report the tier as available at the given load.
    #[must_use]
    pub fn with_load(self, load: f64) -> Self {
        self.set_health(HealthBehavior::Report(TierHealth::new(true, load)));
        self
    }

    /// Report the tier as down.
    #[must_use]
    pub fn unavailable(self) -> Self {
        self.set_health(HealthBehavior::Report(TierHealth::new(false, 1.0)));
        self
    }

    /// Set the estimated cost per request.
    #[must_use]
    pub fn with_cost(self, cost: f64) -> Self {
        self.state.lock_ignore_poison().cost = cost;
        self
    }

    /// Change the health-check behaviour at runtime.
    pub fn set_health(&self, health: HealthBehavior) {
        self.state.lock_ignore_poison().health = health;
    }

    /// Variant ids invoked so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock_ignore_poison().calls.clone()
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock_ignore_poison().calls.len()
    }

    /// Number of health checks answered so far.
    #[must_use]
    pub fn health_check_count(&self) -> usize {
        self.state.lock_ignore_poison().health_checks
    }

    fn next_behavior(&self, variant_id: &str) -> MockBehavior {
        let mut state = self.state.lock_ignore_poison();
        state.calls.push(variant_id.to_owned());
        let behavior = state
            .script
            .pop_front()
            .unwrap_or_else(|| state.fallback.clone());
        drop(state);
        behavior
    }
}

#[async_trait]
impl TierExecutor for MockTier {
    fn tier(&self) -> Tier {
        self.tier
    }

    async fn invoke(
        &self,
        variant_id: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> CoreResult<Vec<u8>, TierError> {
        let timed_out = TierError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
        match self.next_behavior(variant_id) {
            MockBehavior::Respond(output) if output.is_empty() => Ok(payload.to_vec()),
            MockBehavior::Respond(output) => Ok(output),
            MockBehavior::Delay(delay, output) => {
                if delay > timeout {
                    sleep(timeout).await;
                    return Err(timed_out);
                }
                sleep(delay).await;
                Ok(output)
            }
            MockBehavior::Fail(message) => Err(TierError::Failed(message)),
            MockBehavior::Unavailable => {
                Err(TierError::Unavailable(format!("{} is down", self.tier)))
            }
            MockBehavior::Hang => {
                sleep(timeout).await;
                Err(timed_out)
            }
        }
    }

    async fn healthcheck(&self, timeout: Duration) -> CoreResult<TierHealth, TierError> {
        let health = {
            let mut state = self.state.lock_ignore_poison();
            state.health_checks += 1;
            state.health
        };
        match health {
            HealthBehavior::Report(reported) => Ok(reported),
            HealthBehavior::Error => Err(TierError::Failed(format!(
                "{} health endpoint returned an error",
                self.tier
            ))),
            HealthBehavior::Hang => {
                // Sleeps past the budget so the caller's own timeout fires first.
                sleep(timeout.saturating_mul(2)).await;
                Err(TierError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn estimate_cost(&self) -> f64 {
        self.state.lock_ignore_poison().cost
    }
}
