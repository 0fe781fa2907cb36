//! Configuration types for scoring, variant selection, monitoring, caching, and metrics.

use crate::error::{Error, Result};
use crate::types::Tier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tier scoring weights and routing preferences
    pub scoring: ScoringConfig,
    /// Variant selection weights
    pub selector: SelectorConfig,
    /// Resource monitor timing
    pub monitor: MonitorConfig,
    /// Fallback cache configuration
    pub cache: CacheConfig,
    /// Metrics recorder configuration
    pub metrics: MetricsConfig,
    /// Per-tier hardware limits
    pub limits: LimitsConfig,
}

/// Affinity bonus per tier, favoring cheaper execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierAffinity {
    /// Bonus for the constrained local tier
    pub constrained: f64,
    /// Bonus for the mid-tier local tier
    pub midtier: f64,
    /// Bonus for the remote tier
    pub remote: f64,
}

impl TierAffinity {
    /// Bonus for a tier.
    #[must_use]
    pub const fn for_tier(&self, tier: Tier) -> f64 {
        match tier {
            Tier::LocalConstrained => self.constrained,
            Tier::LocalMidtier => self.midtier,
            Tier::Remote => self.remote,
        }
    }
}

impl Default for TierAffinity {
    fn default() -> Self {
        Self {
            constrained: 1.0,
            midtier: 0.6,
            remote: 0.0,
        }
    }
}

/// Tier scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the latency-class match term
    pub latency_weight: f64,
    /// Weight of the load headroom term
    pub headroom_weight: f64,
    /// Weight of the cost term
    pub cost_weight: f64,
    /// Weight of the tier-affinity bonus
    pub affinity_weight: f64,
    /// Remote cost at which the cost term reaches zero
    pub max_acceptable_cost: f64,
    /// Fraction of the top score within which a local runner-up displaces the remote tier
    pub tie_break_fraction: f64,
    /// Priority at or above which raw score order is always kept
    pub priority_override: u8,
    /// Multiples of the latency ceiling over which latency credit decays to zero
    pub latency_decay: f64,
    /// Affinity bonus per tier
    pub affinity: TierAffinity,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            latency_weight: 0.35,
            headroom_weight: 0.25,
            cost_weight: 0.25,
            affinity_weight: 0.15,
            max_acceptable_cost: 0.01,
            tie_break_fraction: 0.70,
            priority_override: 8,
            latency_decay: 1.0,
            affinity: TierAffinity::default(),
        }
    }
}

/// Variant selection weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Weight of normalized accuracy
    pub accuracy_weight: f64,
    /// Weight of inverse-normalized size
    pub size_weight: f64,
    /// Weight of inverse-normalized expected latency
    pub latency_weight: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            accuracy_weight: 0.4,
            size_weight: 0.3,
            latency_weight: 0.3,
        }
    }
}

/// Resource monitor timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between background polls
    pub poll_interval_ms: u64,
    /// Timeout for each tier health check
    pub health_timeout_ms: u64,
    /// Age beyond which a snapshot is refreshed on demand
    pub max_snapshot_age_ms: u64,
}

impl MonitorConfig {
    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Health-check timeout as a duration.
    #[must_use]
    pub const fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    /// Maximum snapshot age as a duration.
    #[must_use]
    pub const fn max_snapshot_age(&self) -> Duration {
        Duration::from_millis(self.max_snapshot_age_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            health_timeout_ms: 250,
            max_snapshot_age_ms: 5000,
        }
    }
}

/// Fallback cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Maximum number of entries
    pub capacity: usize,
    /// Time-to-live for entries in seconds
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Entry time-to-live as a duration.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1024,
            ttl_secs: 3600,
        }
    }
}

/// Metrics recorder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of recent outcomes kept in the rolling window
    pub window: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { window: 1024 }
    }
}

/// Per-tier hardware limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest variant the constrained tier can hold, in size units
    pub constrained_max_variant_size: Option<u64>,
}

impl LimitsConfig {
    /// Size cap for a tier, if any.
    #[must_use]
    pub const fn max_variant_size(&self, tier: Tier) -> Option<u64> {
        match tier {
            Tier::LocalConstrained => self.constrained_max_variant_size,
            Tier::LocalMidtier | Tier::Remote => None,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            constrained_max_variant_size: Some(4096),
        }
    }
}

impl EngineConfig {
    /// Load config from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let header = "# tiercast engine configuration\n\n";
        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Check weights, fractions, and sizes for sane values
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        let scoring = &self.scoring;
        let scoring_weights = [
            ("scoring.latency_weight", scoring.latency_weight),
            ("scoring.headroom_weight", scoring.headroom_weight),
            ("scoring.cost_weight", scoring.cost_weight),
            ("scoring.affinity_weight", scoring.affinity_weight),
            ("selector.accuracy_weight", self.selector.accuracy_weight),
            ("selector.size_weight", self.selector.size_weight),
            ("selector.latency_weight", self.selector.latency_weight),
        ];
        for (name, weight) in scoring_weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "{name} must be a non-negative number, got {weight}"
                )));
            }
        }

        if !(0.0..=1.0).contains(&scoring.tie_break_fraction) {
            return Err(Error::Config(format!(
                "scoring.tie_break_fraction must be within [0, 1], got {}",
                scoring.tie_break_fraction
            )));
        }
        if scoring.max_acceptable_cost <= 0.0 || !scoring.max_acceptable_cost.is_finite() {
            return Err(Error::Config(format!(
                "scoring.max_acceptable_cost must be positive, got {}",
                scoring.max_acceptable_cost
            )));
        }
        if scoring.latency_decay <= 0.0 || !scoring.latency_decay.is_finite() {
            return Err(Error::Config(format!(
                "scoring.latency_decay must be positive, got {}",
                scoring.latency_decay
            )));
        }
        if self.monitor.poll_interval_ms == 0 || self.monitor.health_timeout_ms == 0 {
            return Err(Error::Config(
                "monitor intervals and timeouts must be non-zero".to_owned(),
            ));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(Error::Config(
                "cache.capacity must be non-zero when the cache is enabled".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, to_string};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!((config.scoring.tie_break_fraction - 0.70).abs() < f64::EPSILON);
        assert_eq!(config.scoring.priority_override, 8);
        assert!((config.selector.accuracy_weight - 0.4).abs() < f64::EPSILON);
        assert!(config.cache.enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_serialization() {
        let config = EngineConfig::default();
        let json = match to_string(&config) {
            Ok(serialized_json) => serialized_json,
            Err(error) => panic!("serialize failed: {error}"),
        };
        let deserialized: EngineConfig = match from_str(&json) {
            Ok(value) => value,
            Err(error) => panic!("deserialize failed: {error}"),
        };
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = match toml::from_str(
            "[scoring]\ntie_break_fraction = 0.5\n\n[cache]\ncapacity = 16\n",
        ) {
            Ok(config) => config,
            Err(error) => panic!("parse failed: {error}"),
        };
        assert!((config.scoring.tie_break_fraction - 0.5).abs() < f64::EPSILON);
        assert!((config.scoring.latency_weight - 0.35).abs() < f64::EPSILON);
        assert_eq!(config.cache.capacity, 16);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("tempdir failed: {error}"),
        };
        let path = dir.path().join("nested").join("tiercast.toml");
        let mut config = EngineConfig::default();
        config.monitor.health_timeout_ms = 400;

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.monitor.health_timeout_ms, 400);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.scoring.tie_break_fraction = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        config.selector.size_weight = -0.1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limits_only_cap_constrained_tier() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.max_variant_size(Tier::LocalConstrained), Some(4096));
        assert_eq!(limits.max_variant_size(Tier::Remote), None);
    }
}
