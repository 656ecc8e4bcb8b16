//! Uniform range price model.
//!
//! Stand-in estimator: ignores features and year and samples a price
//! uniformly from `[min_price, max_price)`.

use rand::Rng;

use super::{ExtractedFeatures, PriceModel};
use crate::config::PricingConfig;
use crate::types::{PropertyFeatures, ReaxError, SimRng};

/// Registry name of this model.
pub const MODEL_NAME: &str = "uniform_range";

#[derive(Debug, Clone, PartialEq)]
pub struct UniformRangeModel {
    min_price: f64,
    max_price: f64,
}

impl Default for UniformRangeModel {
    fn default() -> Self {
        Self {
            min_price: 100_000.0,
            max_price: 1_000_000.0,
        }
    }
}

impl UniformRangeModel {
    pub fn new(min_price: f64, max_price: f64) -> Result<Self, ReaxError> {
        if !(min_price > 0.0 && min_price < max_price && max_price.is_finite()) {
            return Err(ReaxError::Config(format!(
                "price range must satisfy 0 < min_price < max_price, got [{min_price}, {max_price})"
            )));
        }
        Ok(Self { min_price, max_price })
    }

    pub fn from_config(cfg: &PricingConfig) -> Result<Self, ReaxError> {
        Self::new(cfg.min_price, cfg.max_price)
    }
}

impl PriceModel for UniformRangeModel {
    fn features_adapter(&self, features: &PropertyFeatures) -> ExtractedFeatures {
        ExtractedFeatures::from([
            ("bathrooms".to_string(), i64::from(features.bathrooms)),
            ("bedrooms".to_string(), i64::from(features.bedrooms)),
        ])
    }

    fn predict_price(&self, features: &PropertyFeatures, _year: u32, rng: &mut SimRng) -> f64 {
        let _extracted = self.features_adapter(features);
        rng.gen_range(self.min_price..self.max_price)
    }

    fn name(&self) -> &'static str {
        MODEL_NAME
    }
}
