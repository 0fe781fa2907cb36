//! Static variant catalog backed by memory or a TOML file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tiercast_core::{Error, ModelVariant, Result, VariantCatalog};

/// On-disk layout: a flat list of `[[variants]]` tables
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    variants: Vec<ModelVariant>,
}

/// Catalog that serves a fixed set of variants.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    variants: BTreeMap<String, Vec<ModelVariant>>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from a list of variants.
    pub fn from_variants(variants: impl IntoIterator<Item = ModelVariant>) -> Self {
        variants
            .into_iter()
            .fold(Self::new(), |catalog, variant| catalog.with_variant(variant))
    }

    /// Add a variant.
    #[must_use]
    pub fn with_variant(mut self, variant: ModelVariant) -> Self {
        self.variants
            .entry(variant.model.clone())
            .or_default()
            .push(variant);
        self
    }

    /// Load a catalog from a TOML file containing `[[variants]]` tables.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            variants = file.variants.len(),
            "Loaded variant catalog"
        );
        Ok(Self::from_variants(file.variants))
    }

    /// Write the catalog to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = CatalogFile {
            variants: self.variants.values().flatten().cloned().collect(),
        };
        let contents = toml::to_string_pretty(&file)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Total number of variants across all models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.values().map(Vec::len).sum()
    }

    /// Whether the catalog holds no variants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl VariantCatalog for StaticCatalog {
    fn models(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    fn list_variants(&self, model: &str) -> Result<Vec<ModelVariant>> {
        if model.is_empty() {
            return Err(Error::Catalog("model name must not be empty".to_owned()));
        }
        Ok(self.variants.get(model).cloned().unwrap_or_default())
    }
}
