//! Picks the best-fitting variant of a model for one tier.

use super::registry::VariantRegistry;
use crate::{Result, RoutingError};
use std::sync::Arc;
use tiercast_core::{InferenceRequest, LimitsConfig, ModelVariant, SelectorConfig, Tier};

/// Hard filters applied before variants are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectionConstraints {
    /// Lowest acceptable accuracy
    pub min_accuracy: Option<f64>,
    /// Largest acceptable size
    pub max_size: Option<u64>,
}

impl SelectionConstraints {
    /// Constraints for a request targeting a tier.
    #[must_use]
    pub fn for_request(request: &InferenceRequest, limits: &LimitsConfig, tier: Tier) -> Self {
        Self {
            min_accuracy: request.min_accuracy,
            max_size: limits.max_variant_size(tier),
        }
    }

    /// Whether a variant passes every filter.
    #[must_use]
    pub fn admits(&self, variant: &ModelVariant) -> bool {
        self.min_accuracy
            .is_none_or(|min_accuracy| variant.accuracy >= min_accuracy)
            && self.max_size.is_none_or(|max_size| variant.size <= max_size)
    }
}

/// Scores registered variants and returns the best one.
pub struct VariantSelector {
    registry: Arc<VariantRegistry>,
    config: SelectorConfig,
}

/// Observed range of one variant attribute.
#[derive(Clone, Copy)]
struct Range {
    min: f64,
    max: f64,
}

impl Range {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        values.fold(
            Self {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |range, value| Self {
                min: range.min.min(value),
                max: range.max.max(value),
            },
        )
    }

    /// Position within the range, `1.0` when every value is equal.
    fn normalize(self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            1.0
        } else {
            (value - self.min) / span
        }
    }

    /// Inverse position: the smallest value scores highest.
    fn inverse(self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= f64::EPSILON {
            1.0
        } else {
            (self.max - value) / span
        }
    }
}

impl VariantSelector {
    /// Create a selector over a registry.
    #[must_use]
    pub fn new(registry: Arc<VariantRegistry>, config: SelectorConfig) -> Self {
        Self { registry, config }
    }

    /// Highest-scoring variant of `model` registered for `tier`.
    ///
    /// # Errors
    /// Returns [`RoutingError::NoVariant`] when no registered variant passes
    /// the constraints.
    pub fn select(
        &self,
        model: &str,
        tier: Tier,
        constraints: &SelectionConstraints,
    ) -> Result<ModelVariant> {
        let variants: Vec<ModelVariant> = self
            .registry
            .variants_for(model, tier)
            .into_iter()
            .filter(|variant| constraints.admits(variant))
            .collect();

        self.best_of(variants).ok_or_else(|| RoutingError::NoVariant {
            model: model.to_owned(),
            tier,
        })
    }

    /// Score of each variant relative to the others in the list.
    #[must_use]
    pub fn scores(&self, variants: &[ModelVariant]) -> Vec<f64> {
        let accuracy = Range::over(variants.iter().map(|variant| variant.accuracy));
        let size = Range::over(variants.iter().map(|variant| variant.size as f64));
        let latency = Range::over(variants.iter().map(|variant| variant.expected_latency_ms as f64));

        variants
            .iter()
            .map(|variant| {
                self.config.accuracy_weight * accuracy.normalize(variant.accuracy)
                    + self.config.size_weight * size.inverse(variant.size as f64)
                    + self.config.latency_weight
                        * latency.inverse(variant.expected_latency_ms as f64)
            })
            .collect()
    }

    fn best_of(&self, variants: Vec<ModelVariant>) -> Option<ModelVariant> {
        let scores = self.scores(&variants);
        let mut best: Option<(usize, f64)> = None;
        for (index, score) in scores.into_iter().enumerate() {
            // Strictly greater keeps the first registered variant on ties.
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }
        best.and_then(|(index, _)| variants.into_iter().nth(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(variants: Vec<ModelVariant>) -> VariantSelector {
        let registry = match VariantRegistry::from_variants(variants) {
            Ok(registry) => registry,
            Err(error) => panic!("registry failed: {error}"),
        };
        VariantSelector::new(Arc::new(registry), SelectorConfig::default())
    }

    #[test]
    fn test_prefers_balanced_variant() -> Result<()> {
        let selector = selector(vec![
            // Most accurate but biggest and slowest.
            ModelVariant::new("m1-fp32", "m1", Tier::LocalMidtier)
                .with_accuracy(0.95)
                .with_size(4000)
                .with_latency_ms(80),
            // Slightly less accurate, much smaller and faster.
            ModelVariant::new("m1-int8", "m1", Tier::LocalMidtier)
                .with_accuracy(0.90)
                .with_size(1000)
                .with_latency_ms(20),
        ]);

        let chosen = selector.select("m1", Tier::LocalMidtier, &SelectionConstraints::default())?;
        assert_eq!(chosen.id, "m1-int8");
        Ok(())
    }

    #[test]
    fn test_no_variant_for_tier() {
        let selector = selector(vec![ModelVariant::new("m1-fp32", "m1", Tier::Remote)]);
        let result = selector.select("m1", Tier::LocalConstrained, &SelectionConstraints::default());
        assert!(matches!(
            result,
            Err(RoutingError::NoVariant { tier: Tier::LocalConstrained, .. })
        ));

        let unknown = selector.select("m9", Tier::Remote, &SelectionConstraints::default());
        assert!(matches!(unknown, Err(RoutingError::NoVariant { .. })));
    }

    #[test]
    fn test_constraints_filter_variants() -> Result<()> {
        let selector = selector(vec![
            ModelVariant::new("m1-large", "m1", Tier::LocalConstrained)
                .with_size(8000)
                .with_accuracy(0.9),
            ModelVariant::new("m1-small", "m1", Tier::LocalConstrained)
                .with_size(2000)
                .with_accuracy(0.6),
        ]);

        let capped = SelectionConstraints {
            max_size: Some(4096),
            ..SelectionConstraints::default()
        };
        assert_eq!(selector.select("m1", Tier::LocalConstrained, &capped)?.id, "m1-small");

        let strict = SelectionConstraints {
            min_accuracy: Some(0.8),
            max_size: Some(4096),
        };
        assert!(selector.select("m1", Tier::LocalConstrained, &strict).is_err());
        Ok(())
    }

    #[test]
    fn test_ties_keep_first_registered() -> Result<()> {
        let selector = selector(vec![
            ModelVariant::new("m1-a", "m1", Tier::Remote),
            ModelVariant::new("m1-b", "m1", Tier::Remote),
        ]);
        let chosen = selector.select("m1", Tier::Remote, &SelectionConstraints::default())?;
        assert_eq!(chosen.id, "m1-a");
        Ok(())
    }

    #[test]
    fn test_constraints_from_request() {
        let request = InferenceRequest::new("m1", Vec::new()).with_min_accuracy(0.7);
        let limits = LimitsConfig::default();

        let constrained = SelectionConstraints::for_request(&request, &limits, Tier::LocalConstrained);
        assert_eq!(constrained.max_size, Some(4096));
        assert_eq!(constrained.min_accuracy, Some(0.7));

        let remote = SelectionConstraints::for_request(&request, &limits, Tier::Remote);
        assert_eq!(remote.max_size, None);
    }
}
