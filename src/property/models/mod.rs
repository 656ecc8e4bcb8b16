//! Price models.
//!
//! Defines the `PriceModel` trait and the `ModelRegistry` that the
//! property factory draws model instances from. Implementations:
//! - `UniformRangeModel`: samples a price uniformly from a fixed range

pub mod uniform;

use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{PropertyFeatures, ReaxError, SimRng};

pub use uniform::UniformRangeModel;

/// Model-ready view of a property's features, keyed by feature name.
pub type ExtractedFeatures = BTreeMap<String, i64>;

/// Abstraction over sale-price estimators.
///
/// Implementors turn structural features and a simulated year into a
/// strictly positive price. All randomness comes from the `rng` argument
/// so a seeded simulation stays reproducible.
#[cfg_attr(test, mockall::automock)]
pub trait PriceModel: Send {
    /// Feature-engineering hook. Must be deterministic in its input.
    fn features_adapter(&self, features: &PropertyFeatures) -> ExtractedFeatures;

    /// Estimate a sale price.
    fn predict_price(&self, features: &PropertyFeatures, year: u32, rng: &mut SimRng) -> f64;

    /// Model identifier for logging and selection.
    fn name(&self) -> &'static str;
}

/// Constructor producing a fresh model instance for one property.
pub type ModelConstructor = Box<dyn Fn() -> Box<dyn PriceModel> + Send + Sync>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered collection of named model constructors.
#[derive(Default)]
pub struct ModelRegistry {
    entries: Vec<(String, ModelConstructor)>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `name`, replacing any earlier one.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn PriceModel> + Send + Sync + 'static,
    {
        let constructor: ModelConstructor = Box::new(constructor);
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name.to_string(), constructor)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Build a fresh instance of the named model.
    pub fn build(&self, name: &str) -> Result<Box<dyn PriceModel>, ReaxError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ctor)| ctor())
            .ok_or_else(|| ReaxError::UnknownModel(name.to_string()))
    }

    /// Build a fresh instance of the model at `index`.
    fn build_at(&self, index: usize) -> Result<Box<dyn PriceModel>, ReaxError> {
        self.entries
            .get(index)
            .map(|(_, ctor)| ctor())
            .ok_or(ReaxError::EmptyRegistry)
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// How a model is chosen for each new property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    /// Uniformly among every registered model.
    Uniform,
    /// Always the named model.
    Named(String),
}

impl ModelSelector {
    /// `"uniform"` maps to [`ModelSelector::Uniform`], anything else names a model.
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("uniform") {
            ModelSelector::Uniform
        } else {
            ModelSelector::Named(value.to_string())
        }
    }

    /// Pick and build a model from `registry`.
    pub fn select(
        &self,
        registry: &ModelRegistry,
        rng: &mut SimRng,
    ) -> Result<Box<dyn PriceModel>, ReaxError> {
        if registry.is_empty() {
            return Err(ReaxError::EmptyRegistry);
        }
        match self {
            ModelSelector::Uniform => {
                let index = rng.gen_range(0..registry.len());
                registry.build_at(index)
            }
            ModelSelector::Named(name) => registry.build(name),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn fixed(name: &'static str, price: f64) -> Box<dyn PriceModel> {
        let mut mock = MockPriceModel::new();
        mock.expect_name().return_const(name);
        mock.expect_predict_price().returning(move |_, _, _| price);
        mock.expect_features_adapter().returning(|_| ExtractedFeatures::new());
        Box::new(mock)
    }

    fn features() -> PropertyFeatures {
        PropertyFeatures { bedrooms: 2, bathrooms: 1 }
    }

    #[test]
    fn test_registry_register_and_build() {
        let mut registry = ModelRegistry::new();
        registry.register("cheap", || fixed("cheap", 1.0));
        registry.register("dear", || fixed("dear", 2.0));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["cheap", "dear"]);

        let model = registry.build("dear").unwrap();
        let mut rng = SimRng::seed_from_u64(0);
        assert_eq!(model.predict_price(&features(), 0, &mut rng), 2.0);
    }

    #[test]
    fn test_registry_replaces_duplicate_name() {
        let mut registry = ModelRegistry::new();
        registry.register("m", || fixed("m", 1.0));
        registry.register("m", || fixed("m", 5.0));

        assert_eq!(registry.len(), 1);
        let mut rng = SimRng::seed_from_u64(0);
        let price = registry.build("m").unwrap().predict_price(&features(), 0, &mut rng);
        assert_eq!(price, 5.0);
    }

    #[test]
    fn test_registry_unknown_model() {
        let registry = ModelRegistry::new();
        assert_eq!(
            registry.build("nope").err(),
            Some(ReaxError::UnknownModel("nope".into()))
        );
    }

    #[test]
    fn test_selector_from_config() {
        assert_eq!(ModelSelector::from_config("uniform"), ModelSelector::Uniform);
        assert_eq!(ModelSelector::from_config("Uniform"), ModelSelector::Uniform);
        assert_eq!(
            ModelSelector::from_config("custom"),
            ModelSelector::Named("custom".into())
        );
    }

    #[test]
    fn test_selector_named_is_deterministic() {
        let mut registry = ModelRegistry::new();
        registry.register("a", || fixed("a", 1.0));
        registry.register("b", || fixed("b", 2.0));

        let selector = ModelSelector::Named("b".into());
        let mut rng = SimRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(selector.select(&registry, &mut rng).unwrap().name(), "b");
        }
    }

    #[test]
    fn test_selector_uniform_covers_all_models() {
        let mut registry = ModelRegistry::new();
        registry.register("a", || fixed("a", 1.0));
        registry.register("b", || fixed("b", 2.0));

        let mut rng = SimRng::seed_from_u64(11);
        let names: std::collections::BTreeSet<&str> = (0..100)
            .map(|_| ModelSelector::Uniform.select(&registry, &mut rng).unwrap().name())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_selector_empty_registry() {
        let registry = ModelRegistry::new();
        let mut rng = SimRng::seed_from_u64(0);
        assert_eq!(
            ModelSelector::Uniform.select(&registry, &mut rng).err(),
            Some(ReaxError::EmptyRegistry)
        );
    }
}
