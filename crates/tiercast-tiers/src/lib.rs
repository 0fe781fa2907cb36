//! Reference collaborators for the tiercast engine.
//!
//! Provides a scriptable [`MockTier`] that stands in for any compute tier and
//! a [`StaticCatalog`] that serves model variants from memory or a TOML file.

/// In-memory and file-backed variant catalog.
pub mod catalog;
/// Scriptable tier executor for tests and benchmarks.
pub mod mock;

pub use catalog::StaticCatalog;
pub use mock::{HealthBehavior, MockBehavior, MockTier};
