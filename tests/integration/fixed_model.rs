//! Deterministic price model for integration testing.
//!
//! Prices each property from its bedroom count so tests can predict the
//! base price without touching the rng.

use reaxland::property::models::{ExtractedFeatures, ModelRegistry, PriceModel};
use reaxland::types::{PropertyFeatures, SimRng};

pub const NAME: &str = "fixed_per_bedroom";

#[derive(Debug, Clone)]
pub struct FixedPriceModel {
    pub per_bedroom: f64,
}

impl FixedPriceModel {
    pub fn new(per_bedroom: f64) -> Self {
        Self { per_bedroom }
    }

    /// Registry holding only this model.
    pub fn registry(per_bedroom: f64) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(NAME, move || -> Box<dyn PriceModel> {
            Box::new(FixedPriceModel::new(per_bedroom))
        });
        registry
    }
}

impl PriceModel for FixedPriceModel {
    fn features_adapter(&self, features: &PropertyFeatures) -> ExtractedFeatures {
        ExtractedFeatures::from([("bedrooms".to_string(), i64::from(features.bedrooms))])
    }

    fn predict_price(&self, features: &PropertyFeatures, _year: u32, _rng: &mut SimRng) -> f64 {
        self.features_adapter(features)
            .get("bedrooms")
            .map_or(0.0, |&b| b as f64 * self.per_bedroom)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
