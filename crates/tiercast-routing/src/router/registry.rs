//! In-process view of the model variant catalog.
//!
//! Loaded from a [`VariantCatalog`] at startup and swapped wholesale on
//! catalog-change notifications, so concurrent readers always observe either
//! the old or the new registry, never a mix.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tiercast_core::{
    Error, IgnoreRwLock as _, ModelVariant, Result, Tier, VariantCatalog,
};

type VariantMap = HashMap<String, Vec<ModelVariant>>;

/// Read-only registry of variants keyed by logical model name.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    variants: RwLock<Arc<VariantMap>>,
}

impl VariantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of variants.
    ///
    /// # Errors
    /// Returns an error if any variant fails validation.
    pub fn from_variants(variants: impl IntoIterator<Item = ModelVariant>) -> Result<Self> {
        let mut map = VariantMap::new();
        for variant in variants {
            map.entry(variant.model.clone()).or_default().push(variant);
        }
        for (model, list) in &map {
            Self::check_model(model, list)?;
        }
        Ok(Self {
            variants: RwLock::new(Arc::new(map)),
        })
    }

    /// Loads every model the catalog knows about.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be read or a variant is invalid.
    pub fn load(catalog: &dyn VariantCatalog) -> Result<Self> {
        let registry = Self::new();
        registry.reload(catalog)?;
        Ok(registry)
    }

    /// Re-reads the catalog and atomically replaces the registry contents.
    ///
    /// On error the previous contents stay in place.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be read or a variant is invalid.
    pub fn reload(&self, catalog: &dyn VariantCatalog) -> Result<usize> {
        let mut map = VariantMap::new();
        for model in catalog.models() {
            let list = catalog.list_variants(&model)?;
            Self::check_model(&model, &list)?;
            if !list.is_empty() {
                map.insert(model, list);
            }
        }

        let total = map.values().map(Vec::len).sum();
        *self.variants.write_ignore_poison() = Arc::new(map);
        tracing::info!(variants = total, "Variant registry loaded");
        Ok(total)
    }

    /// Variants registered for a model on one tier.
    #[must_use]
    pub fn variants_for(&self, model: &str, tier: Tier) -> Vec<ModelVariant> {
        self.current().get(model).map_or_else(Vec::new, |variants| {
            variants
                .iter()
                .filter(|variant| variant.tier == tier)
                .cloned()
                .collect()
        })
    }

    /// Whether any tier has a variant of the model.
    #[must_use]
    pub fn supports(&self, model: &str) -> bool {
        self.current()
            .get(model)
            .is_some_and(|variants| !variants.is_empty())
    }

    /// Tiers with at least one variant of the model.
    #[must_use]
    pub fn tiers_for(&self, model: &str) -> Vec<Tier> {
        let current = self.current();
        let Some(variants) = current.get(model) else {
            return Vec::new();
        };
        Tier::ALL
            .into_iter()
            .filter(|tier| variants.iter().any(|variant| variant.tier == *tier))
            .collect()
    }

    /// Registered model names, sorted.
    #[must_use]
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.current().keys().cloned().collect();
        models.sort_unstable();
        models
    }

    /// Total number of registered variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().values().map(Vec::len).sum()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    fn current(&self) -> Arc<VariantMap> {
        Arc::clone(&*self.variants.read_ignore_poison())
    }

    fn check_model(model: &str, variants: &[ModelVariant]) -> Result<()> {
        let mut seen = HashSet::new();
        for variant in variants {
            variant.validate()?;
            if variant.model != model {
                return Err(Error::InvalidVariant(format!(
                    "variant '{}' belongs to '{}' but was listed under '{model}'",
                    variant.id, variant.model
                )));
            }
            if !seen.insert(variant.id.as_str()) {
                return Err(Error::InvalidVariant(format!(
                    "duplicate variant id '{}' for model '{model}'",
                    variant.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiercast_tiers::StaticCatalog;

    fn catalog() -> StaticCatalog {
        StaticCatalog::from_variants([
            ModelVariant::new("m1-int4", "m1", Tier::LocalConstrained),
            ModelVariant::new("m1-fp16", "m1", Tier::LocalMidtier),
            ModelVariant::new("m1-fp16-large", "m1", Tier::LocalMidtier),
            ModelVariant::new("m2-fp32", "m2", Tier::Remote),
        ])
    }

    #[test]
    fn test_load_from_catalog() -> Result<()> {
        let registry = VariantRegistry::load(&catalog())?;
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.models(), vec!["m1", "m2"]);
        assert_eq!(registry.variants_for("m1", Tier::LocalMidtier).len(), 2);
        assert!(registry.variants_for("m1", Tier::Remote).is_empty());
        assert_eq!(
            registry.tiers_for("m1"),
            vec![Tier::LocalConstrained, Tier::LocalMidtier]
        );
        assert!(registry.supports("m2"));
        assert!(!registry.supports("m3"));
        Ok(())
    }

    #[test]
    fn test_reload_replaces_contents() -> Result<()> {
        let registry = VariantRegistry::load(&catalog())?;
        let updated = StaticCatalog::from_variants([ModelVariant::new("m3-fp32", "m3", Tier::Remote)]);

        let count = registry.reload(&updated)?;
        assert_eq!(count, 1);
        assert!(!registry.supports("m1"));
        assert!(registry.supports("m3"));
        Ok(())
    }

    #[test]
    fn test_rejects_invalid_variants() {
        let bad = StaticCatalog::from_variants([
            ModelVariant::new("m1-a", "m1", Tier::Remote).with_accuracy(2.0),
        ]);
        assert!(VariantRegistry::load(&bad).is_err());

        let duplicate = VariantRegistry::from_variants([
            ModelVariant::new("m1-a", "m1", Tier::Remote),
            ModelVariant::new("m1-a", "m1", Tier::LocalMidtier),
        ]);
        assert!(matches!(duplicate, Err(Error::InvalidVariant(_))));
    }

    #[test]
    fn test_failed_reload_keeps_previous_contents() -> Result<()> {
        let registry = VariantRegistry::load(&catalog())?;
        let bad = StaticCatalog::from_variants([
            ModelVariant::new("", "m9", Tier::Remote),
        ]);
        assert!(registry.reload(&bad).is_err());
        assert!(registry.supports("m1"));
        Ok(())
    }
}
