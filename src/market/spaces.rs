//! Action and observation spaces.
//!
//! Both depend only on the property and agent counts, so they are built
//! once when the market is created and handed out by reference.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Observation};

/// Integers `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteSpace {
    pub n: usize,
}

impl DiscreteSpace {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn contains(&self, value: usize) -> bool {
        value < self.n
    }
}

/// Scalar interval `[low, high]`; `high` may be infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub low: f64,
    pub high: f64,
}

impl BoxSpace {
    pub fn non_negative() -> Self {
        Self {
            low: 0.0,
            high: f64::INFINITY,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        !value.is_nan() && value >= self.low && value <= self.high
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpace {
    pub owner: DiscreteSpace,
    pub sale_price: BoxSpace,
}

/// Structured space every agent observation lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSpace {
    pub cash_balance: BoxSpace,
    pub properties: Vec<PropertySpace>,
    pub action_mask_len: usize,
}

impl ObservationSpace {
    pub fn new(property_count: usize, agent_count: usize) -> Self {
        Self {
            cash_balance: BoxSpace::non_negative(),
            properties: (0..property_count)
                .map(|_| PropertySpace {
                    owner: DiscreteSpace::new(agent_count + 1),
                    sale_price: BoxSpace::non_negative(),
                })
                .collect(),
            action_mask_len: Action::space_size(property_count),
        }
    }

    /// Structural check of an observation against this space.
    ///
    /// Cash is allowed to go negative in the simulation, so callers that
    /// let agents overspend should expect `cash_balance` to fall outside.
    pub fn contains(&self, obs: &Observation) -> bool {
        self.cash_balance.contains(obs.cash_balance)
            && obs.properties.len() == self.properties.len()
            && obs
                .properties
                .iter()
                .zip(&self.properties)
                .all(|(p, space)| {
                    space.owner.contains(p.owner) && space.sale_price.contains(p.sale_price)
                })
            && obs.action_mask.len() == self.action_mask_len
            && obs.action_mask.iter().all(|&m| m <= 1)
    }
}

/// Action space for a market of `property_count` properties.
pub fn action_space(property_count: usize) -> DiscreteSpace {
    DiscreteSpace::new(Action::space_size(property_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyObservation;

    fn obs(cash: f64, owner: usize, price: f64, mask: Vec<u8>) -> Observation {
        Observation {
            cash_balance: cash,
            properties: vec![PropertyObservation { owner, sale_price: price }],
            action_mask: mask,
        }
    }

    #[test]
    fn test_action_space_size() {
        assert_eq!(action_space(1).n, 3);
        assert_eq!(action_space(10).n, 21);
        assert!(action_space(1).contains(2));
        assert!(!action_space(1).contains(3));
    }

    #[test]
    fn test_box_space() {
        let b = BoxSpace::non_negative();
        assert!(b.contains(0.0));
        assert!(b.contains(1e12));
        assert!(!b.contains(-0.01));
        assert!(!b.contains(f64::NAN));
    }

    #[test]
    fn test_observation_space_contains() {
        let space = ObservationSpace::new(1, 1);
        assert_eq!(space.properties.len(), 1);
        assert_eq!(space.properties[0].owner.n, 2);

        assert!(space.contains(&obs(100.0, 0, 50.0, vec![1, 1, 0])));
        assert!(space.contains(&obs(100.0, 1, 50.0, vec![1, 0, 1])));
        assert!(!space.contains(&obs(100.0, 2, 50.0, vec![1, 0, 1])));
        assert!(!space.contains(&obs(-1.0, 0, 50.0, vec![1, 1, 0])));
        assert!(!space.contains(&obs(100.0, 0, 50.0, vec![1, 1])));
        assert!(!space.contains(&obs(100.0, 0, 50.0, vec![1, 2, 0])));
    }
}
