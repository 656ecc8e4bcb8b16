//! Property simulation.
//!
//! A `Property` owns one price model, a drifting sale price and its
//! ownership record. Prices move by a bounded multiplicative jitter each
//! step; the model is consulted only once, when the property is built.

pub mod factory;
pub mod models;

use rand::Rng;
use std::fmt;
use tracing::trace;

use crate::config::PricingConfig;
use crate::types::{BoughtDetails, PropertyFeatures, PropertyId, ReaxError, SimRng};
use models::PriceModel;

pub use factory::PropertyFactory;

// ---------------------------------------------------------------------------
// Price jitter
// ---------------------------------------------------------------------------

/// Half-open range `[low, high)` of the per-step price multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceJitter {
    pub low: f64,
    pub high: f64,
}

impl Default for PriceJitter {
    fn default() -> Self {
        Self { low: 0.98, high: 1.02 }
    }
}

impl PriceJitter {
    pub fn new(low: f64, high: f64) -> Result<Self, ReaxError> {
        let jitter = Self { low, high };
        jitter.validate()?;
        Ok(jitter)
    }

    pub fn from_config(cfg: &PricingConfig) -> Result<Self, ReaxError> {
        Self::new(cfg.jitter_low, cfg.jitter_high)
    }

    /// `sample` needs `0 < low < high`.
    pub fn validate(&self) -> Result<(), ReaxError> {
        if self.low > 0.0 && self.low < self.high && self.high.is_finite() {
            Ok(())
        } else {
            Err(ReaxError::Config(format!(
                "jitter range must satisfy 0 < low < high, got [{}, {})",
                self.low, self.high
            )))
        }
    }

    pub fn sample(&self, rng: &mut SimRng) -> f64 {
        rng.gen_range(self.low..self.high)
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

pub struct Property {
    id: PropertyId,
    features: PropertyFeatures,
    model: Box<dyn PriceModel>,
    jitter: PriceJitter,
    /// Model output at construction; every episode restarts from it.
    base_price: f64,
    /// Live simulated price. Only public through `last_selling_price` while unowned.
    price: f64,
    year: u32,
    bought: Option<BoughtDetails>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id)
            .field("features", &self.features)
            .field("model", &self.model.name())
            .field("price", &self.price)
            .field("year", &self.year)
            .field("bought", &self.bought)
            .finish()
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match self.owner() {
            Some(owner) => format!("Owned by {owner}"),
            None => "Unowned".to_string(),
        };
        write!(
            f,
            "Property {}: {} | Price: ${:.2}",
            self.id,
            owner,
            self.last_selling_price()
        )
    }
}

impl Property {
    /// Build a property, pricing it once with `model`.
    pub fn new(
        id: PropertyId,
        features: PropertyFeatures,
        start_year: u32,
        model: Box<dyn PriceModel>,
        jitter: PriceJitter,
        rng: &mut SimRng,
    ) -> Result<Self, ReaxError> {
        jitter.validate()?;
        let price = model.predict_price(&features, start_year, rng);
        if !(price.is_finite() && price > 0.0) {
            return Err(ReaxError::InvalidPrice {
                property_id: id,
                model: model.name().to_string(),
                price,
            });
        }
        Ok(Self {
            id,
            features,
            model,
            jitter,
            base_price: price,
            price,
            year: start_year,
            bought: None,
        })
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn features(&self) -> &PropertyFeatures {
        &self.features
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    /// Live simulated price, regardless of ownership.
    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Purchase price while owned.
    pub fn bought_price(&self) -> Option<f64> {
        self.bought.as_ref().map(|b| b.bought_price)
    }

    /// Apply one multiplicative drift to the current price.
    ///
    /// The price model is not re-run here; `year` is accepted so a model
    /// that depends on time can be slotted in without changing callers.
    pub fn predict_price(&mut self, _year: u32, rng: &mut SimRng) {
        self.price *= self.jitter.sample(rng);
    }

    /// Bought price while owned, otherwise the live price.
    pub fn last_selling_price(&self) -> f64 {
        match &self.bought {
            Some(details) => details.bought_price,
            None => self.price,
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.bought.as_ref().map(|b| b.owner.as_str())
    }

    pub fn is_owned(&self) -> bool {
        self.bought.is_some()
    }

    /// Record a purchase at the current price. Returns the price paid.
    pub fn buy(&mut self, agent: &str) -> Result<f64, ReaxError> {
        if let Some(details) = &self.bought {
            return Err(ReaxError::AlreadyOwned {
                property_id: self.id,
                owner: details.owner.clone(),
            });
        }
        self.bought = Some(BoughtDetails {
            bought_price: self.price,
            owner: agent.to_string(),
        });
        Ok(self.price)
    }

    /// Clear ownership and return the profit against the live price.
    pub fn sell(&mut self) -> Result<f64, ReaxError> {
        let details = self
            .bought
            .take()
            .ok_or(ReaxError::NotOwned { property_id: self.id })?;
        Ok(self.price - details.bought_price)
    }

    /// Advance one timestep.
    pub fn step(&mut self, year: u32, rng: &mut SimRng) {
        self.predict_price(year, rng);
        self.year = year;
        trace!(property = self.id, year, price = self.price, "Property stepped");
    }

    /// Start a new episode: restart from the base price, jitter once,
    /// clear ownership.
    pub fn reset(&mut self, year: u32, rng: &mut SimRng) {
        self.price = self.base_price;
        self.predict_price(year, rng);
        self.year = year;
        self.bought = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
