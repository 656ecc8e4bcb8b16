//! Shared types for the ReaXLand simulation.
//!
//! These types form the data model used across the property, market,
//! environment and engine modules. They carry no behaviour beyond
//! formatting and small conversions so that every module can depend on
//! them without circular references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Agent identifier, e.g. `"investor_agent"`.
pub type AgentId = String;

/// Property identifier. Equal to the property's index in the market.
pub type PropertyId = usize;

/// Raw action code submitted by an agent.
pub type ActionCode = usize;

/// One action per agent for a single step.
pub type Actions = BTreeMap<AgentId, ActionCode>;

/// Per-agent observations.
pub type Observations = BTreeMap<AgentId, Observation>;

/// Per-agent info payloads.
pub type Infos = BTreeMap<AgentId, AgentInfo>;

/// Random source owned by a simulation and threaded into every stochastic call.
pub type SimRng = rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// Property data
// ---------------------------------------------------------------------------

/// Structural attributes of a property. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFeatures {
    pub bedrooms: u32,
    pub bathrooms: u32,
}

impl fmt::Display for PropertyFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bed / {} bath", self.bedrooms, self.bathrooms)
    }
}

/// Purchase record of an owned property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoughtDetails {
    /// Price paid; does not follow later drift.
    pub bought_price: f64,
    pub owner: AgentId,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Decoded agent action.
///
/// Code layout: `0` holds, `1 + 2i` buys property `i`, `2 + 2i` sells
/// property `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Hold,
    Buy(PropertyId),
    Sell(PropertyId),
}

impl Action {
    /// Code of the hold action.
    pub const HOLD_CODE: ActionCode = 0;

    /// Code buying property `i`.
    pub fn buy_code(i: PropertyId) -> ActionCode {
        1 + 2 * i
    }

    /// Code selling property `i`.
    pub fn sell_code(i: PropertyId) -> ActionCode {
        2 + 2 * i
    }

    /// Number of distinct codes for a market of `property_count` properties.
    pub fn space_size(property_count: usize) -> usize {
        1 + 2 * property_count
    }

    /// Decode a raw code. Returns `None` when the code is out of range.
    pub fn from_code(code: ActionCode, property_count: usize) -> Option<Self> {
        if code == Self::HOLD_CODE {
            return Some(Action::Hold);
        }
        if code >= Self::space_size(property_count) {
            return None;
        }
        let i = (code - 1) / 2;
        if code % 2 == 1 {
            Some(Action::Buy(i))
        } else {
            Some(Action::Sell(i))
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Buy(i) => write!(f, "BUY #{i}"),
            Action::Sell(i) => write!(f, "SELL #{i}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// Public view of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyObservation {
    /// `0` when unowned, otherwise 1-based index into the configured agents.
    pub owner: usize,
    /// Last selling price.
    pub sale_price: f64,
}

/// What a single agent observes after reset or step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub cash_balance: f64,
    pub properties: Vec<PropertyObservation>,
    /// One entry per action code, `1` when the action is currently legal.
    pub action_mask: Vec<u8>,
}

impl Observation {
    /// Codes whose mask entry is set.
    pub fn legal_actions(&self) -> Vec<ActionCode> {
        self.action_mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == 1)
            .map(|(code, _)| code)
            .collect()
    }

    /// Whether `code` is legal according to the mask.
    pub fn is_legal(&self, code: ActionCode) -> bool {
        self.action_mask.get(code).copied() == Some(1)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cash=${:.2} | properties={} | legal={:?}",
            self.cash_balance,
            self.properties.len(),
            self.legal_actions(),
        )
    }
}

/// Auxiliary per-agent information returned alongside observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub timestep: u64,
    /// Ids of the properties this agent currently owns.
    pub owned_properties: Vec<PropertyId>,
}

// ---------------------------------------------------------------------------
// Step result
// ---------------------------------------------------------------------------

/// Everything returned by a single environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observations: Observations,
    pub rewards: BTreeMap<AgentId, f64>,
    pub terminations: BTreeMap<AgentId, bool>,
    pub truncations: BTreeMap<AgentId, bool>,
    pub infos: Infos,
}

impl StepResult {
    /// Reward of one agent, `0.0` if the agent is absent.
    pub fn reward(&self, agent: &str) -> f64 {
        self.rewards.get(agent).copied().unwrap_or(0.0)
    }

    /// Whether every agent reported termination or truncation.
    pub fn is_done(&self) -> bool {
        self.terminations.keys().all(|agent| {
            self.terminations.get(agent).copied().unwrap_or(false)
                || self.truncations.get(agent).copied().unwrap_or(false)
        })
    }
}

/// Optional per-episode overrides accepted by `reset`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetOptions {
    /// Cash each agent starts the episode with, replacing the configured amount.
    pub starting_cash: Option<f64>,
}

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    NotReset,
    Active,
    Terminated,
}

impl fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodePhase::NotReset => write!(f, "NOT RESET"),
            EpisodePhase::Active => write!(f, "ACTIVE"),
            EpisodePhase::Terminated => write!(f, "TERMINATED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ReaXLand.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReaxError {
    #[error("Property {property_id} must be bought before selling")]
    NotOwned { property_id: PropertyId },

    #[error("Property {property_id} is already owned by {owner}")]
    AlreadyOwned { property_id: PropertyId, owner: AgentId },

    #[error("Unknown agent: {0}")]
    UnknownAgent(AgentId),

    #[error("No action submitted for active agent: {0}")]
    MissingAction(AgentId),

    #[error("Environment must be reset before stepping")]
    NotReset,

    #[error("Episode is over; call reset to start a new one")]
    EpisodeOver,

    #[error("Price model {model} produced an invalid price for property {property_id}: {price}")]
    InvalidPrice { property_id: PropertyId, model: String, price: f64 },

    #[error("Unknown price model: {0}")]
    UnknownModel(String),

    #[error("No price models registered")]
    EmptyRegistry,

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_codes() {
        assert_eq!(Action::buy_code(0), 1);
        assert_eq!(Action::sell_code(0), 2);
        assert_eq!(Action::buy_code(1), 3);
        assert_eq!(Action::sell_code(1), 4);
        assert_eq!(Action::space_size(3), 7);
    }

    #[test]
    fn test_action_from_code() {
        assert_eq!(Action::from_code(0, 2), Some(Action::Hold));
        assert_eq!(Action::from_code(1, 2), Some(Action::Buy(0)));
        assert_eq!(Action::from_code(2, 2), Some(Action::Sell(0)));
        assert_eq!(Action::from_code(3, 2), Some(Action::Buy(1)));
        assert_eq!(Action::from_code(4, 2), Some(Action::Sell(1)));
        assert_eq!(Action::from_code(5, 2), None);
        assert_eq!(Action::from_code(1, 0), None);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(format!("{}", Action::Hold), "HOLD");
        assert_eq!(format!("{}", Action::Buy(2)), "BUY #2");
        assert_eq!(format!("{}", Action::Sell(0)), "SELL #0");
    }

    #[test]
    fn test_observation_legal_actions() {
        let obs = Observation {
            cash_balance: 100.0,
            properties: vec![PropertyObservation { owner: 0, sale_price: 50.0 }],
            action_mask: vec![1, 1, 0],
        };
        assert_eq!(obs.legal_actions(), vec![0, 1]);
        assert!(obs.is_legal(1));
        assert!(!obs.is_legal(2));
        assert!(!obs.is_legal(99));
    }

    #[test]
    fn test_step_result_reward_and_done() {
        let mut result = StepResult {
            observations: BTreeMap::new(),
            rewards: BTreeMap::from([("a".to_string(), 1.5)]),
            terminations: BTreeMap::from([("a".to_string(), false)]),
            truncations: BTreeMap::from([("a".to_string(), false)]),
            infos: BTreeMap::new(),
        };
        assert_eq!(result.reward("a"), 1.5);
        assert_eq!(result.reward("missing"), 0.0);
        assert!(!result.is_done());

        result.terminations.insert("a".to_string(), true);
        assert!(result.is_done());
    }

    #[test]
    fn test_observation_serialization_roundtrip() {
        let obs = Observation {
            cash_balance: 100_000.0,
            properties: vec![PropertyObservation { owner: 1, sale_price: 250_000.0 }],
            action_mask: vec![1, 0, 1],
        };
        let json = serde_json::to_string(&obs).unwrap();
        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }

    #[test]
    fn test_error_display() {
        let err = ReaxError::NotOwned { property_id: 3 };
        assert_eq!(err.to_string(), "Property 3 must be bought before selling");

        let err = ReaxError::AlreadyOwned { property_id: 0, owner: "investor_agent".into() };
        assert!(err.to_string().contains("investor_agent"));

        let err = ReaxError::UnknownAgent("ghost".into());
        assert_eq!(err.to_string(), "Unknown agent: ghost");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(EpisodePhase::Active.to_string(), "ACTIVE");
        assert_eq!(EpisodePhase::Terminated.to_string(), "TERMINATED");
    }
}
