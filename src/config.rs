//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section and field has a default (one investor, one property),
//! so an empty file (or no file at all) yields a runnable environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::types::ReaxError;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub rewards: RewardConfig,
    pub pricing: PricingConfig,
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Every agent that may take part in an episode, in observation order.
    pub agents: Vec<String>,
    pub property_count: usize,
    /// The episode terminates once the timestep exceeds this value.
    pub horizon: u64,
    pub starting_cash: f64,
    pub start_year: u32,
    /// Seed for building properties (features, model choice, base prices).
    pub build_seed: u64,
    /// When true, sell actions from agents that do not own the property are skipped.
    pub require_owner_to_sell: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            agents: vec!["investor_agent".to_string()],
            property_count: 1,
            horizon: 100,
            starting_cash: 100_000.0,
            start_year: 0,
            build_seed: 0,
            require_owner_to_sell: false,
        }
    }
}

/// Reward shaping rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Bonus per unit of cash held, paid every step.
    pub liquidity_reward: f64,
    /// Share of realised profit paid on a sale.
    pub sale_profit: f64,
    /// Penalty per unit of purchase price.
    pub buy_penalty: f64,
    /// Per-step cost per unit of an owned property's selling price.
    pub holding_cost: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            liquidity_reward: 0.0001,
            sale_profit: 0.5,
            buy_penalty: 0.01,
            holding_cost: 0.002,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub min_price: f64,
    pub max_price: f64,
    /// Lower bound (inclusive) of the per-step price multiplier.
    pub jitter_low: f64,
    /// Upper bound (exclusive) of the per-step price multiplier.
    pub jitter_high: f64,
    /// Inclusive bedroom range.
    pub bedrooms: [u32; 2],
    /// Inclusive bathroom range.
    pub bathrooms: [u32; 2],
    /// `"uniform"` picks among all registered models, anything else names one.
    pub model: String,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_price: 100_000.0,
            max_price: 1_000_000.0,
            jitter_low: 0.98,
            jitter_high: 1.02,
            bedrooms: [1, 5],
            bathrooms: [1, 3],
            model: "uniform".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub episodes: u32,
    /// Render every N steps; `0` disables rendering.
    pub render_every: u64,
    /// `"hold"` or `"random"`.
    pub policy: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            episodes: 1,
            render_every: 0,
            policy: "random".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ReaxError> {
        self.market.validate()?;
        self.pricing.validate()
    }
}

impl MarketConfig {
    pub fn validate(&self) -> Result<(), ReaxError> {
        if self.agents.is_empty() {
            return Err(ReaxError::Config("at least one agent is required".into()));
        }
        let unique: BTreeSet<&String> = self.agents.iter().collect();
        if unique.len() != self.agents.len() {
            return Err(ReaxError::Config("agent names must be unique".into()));
        }
        if self.property_count == 0 {
            return Err(ReaxError::Config("property_count must be positive".into()));
        }
        if !self.starting_cash.is_finite() {
            return Err(ReaxError::Config("starting_cash must be finite".into()));
        }
        Ok(())
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), ReaxError> {
        if !(self.min_price > 0.0 && self.min_price < self.max_price) {
            return Err(ReaxError::Config(format!(
                "price range must satisfy 0 < min_price < max_price, got [{}, {})",
                self.min_price, self.max_price
            )));
        }
        if !(self.jitter_low > 0.0 && self.jitter_low < self.jitter_high) {
            return Err(ReaxError::Config(format!(
                "jitter range must satisfy 0 < jitter_low < jitter_high, got [{}, {})",
                self.jitter_low, self.jitter_high
            )));
        }
        if self.bedrooms[0] > self.bedrooms[1] {
            return Err(ReaxError::Config("bedrooms range is inverted".into()));
        }
        if self.bathrooms[0] > self.bathrooms[1] {
            return Err(ReaxError::Config("bathrooms range is inverted".into()));
        }
        Ok(())
    }
}
