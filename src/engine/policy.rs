//! Action policies used by the runner and the API check.

use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::types::{Action, ActionCode, Observation, ReaxError, SimRng};

pub trait Policy {
    fn name(&self) -> &'static str;

    /// Pick an action code for `agent` given its latest observation.
    fn act(&mut self, agent: &str, observation: &Observation) -> ActionCode;
}

/// Never trades.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldPolicy;

impl Policy for HoldPolicy {
    fn name(&self) -> &'static str {
        "hold"
    }

    fn act(&mut self, _agent: &str, _observation: &Observation) -> ActionCode {
        Action::HOLD_CODE
    }
}

/// Uniform choice among the actions the mask allows.
#[derive(Debug, Clone)]
pub struct RandomMaskedPolicy {
    rng: SimRng,
}

impl RandomMaskedPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomMaskedPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn act(&mut self, _agent: &str, observation: &Observation) -> ActionCode {
        observation
            .legal_actions()
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::HOLD_CODE)
    }
}

/// Build a policy from its configured name.
pub fn policy_from_name(name: &str, seed: u64) -> Result<Box<dyn Policy>, ReaxError> {
    match name.to_ascii_lowercase().as_str() {
        "hold" => Ok(Box::new(HoldPolicy)),
        "random" => Ok(Box::new(RandomMaskedPolicy::new(seed))),
        other => Err(ReaxError::Config(format!("unknown policy: {other}"))),
    }
}
