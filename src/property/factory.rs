//! Property factory.
//!
//! Builds the market's property set: random features, one model instance
//! per property chosen by a `ModelSelector`, and an initial model price.

use rand::Rng;
use tracing::debug;

use super::models::{uniform, ModelRegistry, ModelSelector, PriceModel, UniformRangeModel};
use super::{PriceJitter, Property};
use crate::config::PricingConfig;
use crate::types::{PropertyFeatures, ReaxError, SimRng};

#[derive(Debug)]
pub struct PropertyFactory {
    registry: ModelRegistry,
    selector: ModelSelector,
    jitter: PriceJitter,
    bedrooms: (u32, u32),
    bathrooms: (u32, u32),
}

impl PropertyFactory {
    pub fn new(registry: ModelRegistry, selector: ModelSelector) -> Self {
        Self {
            registry,
            selector,
            jitter: PriceJitter::default(),
            bedrooms: (1, 5),
            bathrooms: (1, 3),
        }
    }

    /// Factory with the built-in models registered, shaped by `cfg`.
    pub fn from_config(cfg: &PricingConfig) -> Result<Self, ReaxError> {
        cfg.validate()?;
        let mut registry = ModelRegistry::new();
        let model = UniformRangeModel::from_config(cfg)?;
        registry.register(uniform::MODEL_NAME, move || -> Box<dyn PriceModel> {
            Box::new(model.clone())
        });

        Ok(Self {
            registry,
            selector: ModelSelector::from_config(&cfg.model),
            jitter: PriceJitter::from_config(cfg)?,
            bedrooms: (cfg.bedrooms[0], cfg.bedrooms[1]),
            bathrooms: (cfg.bathrooms[0], cfg.bathrooms[1]),
        })
    }

    pub fn with_jitter(mut self, jitter: PriceJitter) -> Result<Self, ReaxError> {
        jitter.validate()?;
        self.jitter = jitter;
        Ok(self)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Build `count` properties with ids `0..count`.
    pub fn create_properties(
        &self,
        count: usize,
        start_year: u32,
        rng: &mut SimRng,
    ) -> Result<Vec<Property>, ReaxError> {
        (0..count)
            .map(|id| {
                let features = PropertyFeatures {
                    bedrooms: rng.gen_range(self.bedrooms.0..=self.bedrooms.1),
                    bathrooms: rng.gen_range(self.bathrooms.0..=self.bathrooms.1),
                };
                let model = self.selector.select(&self.registry, rng)?;
                let property = Property::new(id, features, start_year, model, self.jitter, rng)?;
                debug!(
                    property = id,
                    features = %property.features(),
                    model = property.model_name(),
                    price = property.price(),
                    "Property created"
                );
                Ok(property)
            })
            .collect()
    }
}
