//! Reward shaping.
//!
//! Each term is linear in a price or balance; the rates come from
//! `RewardConfig`.

use crate::config::RewardConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RewardShaper {
    config: RewardConfig,
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self::new(RewardConfig::default())
    }
}

impl RewardShaper {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Per-step cost charged to the owner of a property (positive amount).
    pub fn holding_cost(&self, selling_price: f64) -> f64 {
        selling_price * self.config.holding_cost
    }

    /// Penalty for buying at `price` (positive amount).
    pub fn buy_penalty(&self, price: f64) -> f64 {
        price * self.config.buy_penalty
    }

    /// Reward for realising `profit`; negative when the sale made a loss.
    pub fn sale_reward(&self, profit: f64) -> f64 {
        profit * self.config.sale_profit
    }

    /// Per-step bonus for holding `cash`.
    pub fn liquidity_bonus(&self, cash: f64) -> f64 {
        cash * self.config.liquidity_reward
    }
}
