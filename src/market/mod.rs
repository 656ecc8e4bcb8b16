//! Market simulation: the episode state machine.
//!
//! Owns every property and each agent's cash. A step charges holding
//! costs, applies each agent's action property by property, drifts every
//! price, pays the liquidity bonus and finally checks the horizon.

pub mod rewards;
pub mod spaces;

use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, MarketConfig};
use crate::property::{Property, PropertyFactory};
use crate::types::{
    Action, Actions, AgentId, AgentInfo, EpisodePhase, Infos, Observation,
    Observations, PropertyId, PropertyObservation, ReaxError, ResetOptions, SimRng, StepResult,
};
use rewards::RewardShaper;
use spaces::{DiscreteSpace, ObservationSpace};

pub struct MarketSimulation {
    config: MarketConfig,
    shaper: RewardShaper,
    possible_agents: Vec<AgentId>,
    agents: Vec<AgentId>,
    properties: Vec<Property>,
    cash_balance: BTreeMap<AgentId, f64>,
    timestep: u64,
    rng: SimRng,
    seed: Option<u64>,
    phase: EpisodePhase,
    action_space: DiscreteSpace,
    observation_space: ObservationSpace,
}

impl fmt::Debug for MarketSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketSimulation")
            .field("phase", &self.phase)
            .field("timestep", &self.timestep)
            .field("seed", &self.seed)
            .field("agents", &self.agents)
            .field("cash_balance", &self.cash_balance)
            .field("properties", &self.properties)
            .finish()
    }
}

impl MarketSimulation {
    /// Build a market from configuration using the built-in price models.
    pub fn new(config: &AppConfig) -> Result<Self, ReaxError> {
        let factory = PropertyFactory::from_config(&config.pricing)?;
        Self::with_factory(config, &factory)
    }

    /// Build a market whose properties come from `factory`.
    pub fn with_factory(config: &AppConfig, factory: &PropertyFactory) -> Result<Self, ReaxError> {
        config.validate()?;
        let mut build_rng = SimRng::seed_from_u64(config.market.build_seed);
        let properties = factory.create_properties(
            config.market.property_count,
            config.market.start_year,
            &mut build_rng,
        )?;
        Self::with_properties(
            config.market.clone(),
            RewardShaper::new(config.rewards.clone()),
            properties,
        )
    }

    /// Build a market around an existing property set.
    ///
    /// `config.property_count` is ignored; the count is `properties.len()`.
    pub fn with_properties(
        config: MarketConfig,
        shaper: RewardShaper,
        properties: Vec<Property>,
    ) -> Result<Self, ReaxError> {
        if config.agents.is_empty() {
            return Err(ReaxError::Config("at least one agent is required".into()));
        }
        let unique: BTreeSet<&AgentId> = config.agents.iter().collect();
        if unique.len() != config.agents.len() {
            return Err(ReaxError::Config("agent names must be unique".into()));
        }
        if !config.starting_cash.is_finite() {
            return Err(ReaxError::Config("starting_cash must be finite".into()));
        }
        if properties.is_empty() {
            return Err(ReaxError::Config("at least one property is required".into()));
        }
        if let Some((pos, p)) = properties.iter().enumerate().find(|(pos, p)| p.id() != *pos) {
            return Err(ReaxError::Config(format!(
                "property at position {pos} has id {}",
                p.id()
            )));
        }

        let possible_agents = config.agents.clone();
        let cash_balance = possible_agents
            .iter()
            .map(|a| (a.clone(), config.starting_cash))
            .collect();

        Ok(Self {
            action_space: spaces::action_space(properties.len()),
            observation_space: ObservationSpace::new(properties.len(), possible_agents.len()),
            rng: SimRng::seed_from_u64(config.build_seed),
            config,
            shaper,
            possible_agents,
            agents: Vec::new(),
            properties,
            cash_balance,
            timestep: 0,
            seed: None,
            phase: EpisodePhase::NotReset,
        })
    }

    // -- Accessors -------------------------------------------------------

    pub fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    /// Agents still taking part in the current episode.
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(id)
    }

    pub fn cash_balance(&self, agent: &str) -> Option<f64> {
        self.cash_balance.get(agent).copied()
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Seed of the current episode, once reset.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == EpisodePhase::Terminated
    }

    pub fn action_space(&self, agent: &str) -> Result<&DiscreteSpace, ReaxError> {
        self.ensure_known(agent)?;
        Ok(&self.action_space)
    }

    pub fn observation_space(&self, agent: &str) -> Result<&ObservationSpace, ReaxError> {
        self.ensure_known(agent)?;
        Ok(&self.observation_space)
    }

    // -- Episode lifecycle -----------------------------------------------

    /// Start a new episode.
    ///
    /// With `seed = None` a fresh seed is drawn from entropy; it is kept
    /// and available through [`MarketSimulation::seed`].
    pub fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<ResetOptions>,
    ) -> Result<(Observations, Infos), ReaxError> {
        let options = options.unwrap_or_default();
        let starting_cash = options.starting_cash.unwrap_or(self.config.starting_cash);
        if !starting_cash.is_finite() {
            return Err(ReaxError::Config(format!(
                "starting cash must be finite, got {starting_cash}"
            )));
        }

        self.agents = self.possible_agents.clone();

        let seed = seed.unwrap_or_else(rand::random);
        self.seed = Some(seed);
        self.rng = SimRng::seed_from_u64(seed);

        self.timestep = 0;
        let year = self.year_at(self.timestep);
        for property in &mut self.properties {
            property.reset(year, &mut self.rng);
        }

        self.cash_balance = self
            .possible_agents
            .iter()
            .map(|a| (a.clone(), starting_cash))
            .collect();
        self.phase = EpisodePhase::Active;

        info!(
            seed,
            agents = self.agents.len(),
            properties = self.properties.len(),
            starting_cash,
            "Episode reset"
        );

        Ok((self.observations(), self.infos()))
    }

    /// Advance one timestep with one action per active agent.
    pub fn step(&mut self, actions: &Actions) -> Result<StepResult, ReaxError> {
        match self.phase {
            EpisodePhase::NotReset => return Err(ReaxError::NotReset),
            EpisodePhase::Terminated => return Err(ReaxError::EpisodeOver),
            EpisodePhase::Active => {}
        }
        self.validate_actions(actions)?;

        let property_count = self.properties.len();
        let decoded: Vec<(AgentId, Option<Action>)> = self
            .agents
            .iter()
            .map(|agent| {
                let code = actions.get(agent).copied().unwrap_or(Action::HOLD_CODE);
                let action = Action::from_code(code, property_count);
                if action.is_none() {
                    debug!(agent = %agent, code, "Out-of-range action code ignored");
                }
                (agent.clone(), action)
            })
            .collect();

        let mut rewards: BTreeMap<AgentId, f64> =
            self.agents.iter().map(|a| (a.clone(), 0.0)).collect();

        self.timestep += 1;
        let year = self.year_at(self.timestep);

        for (i, property) in self.properties.iter_mut().enumerate() {
            if let Some(owner) = property.owner() {
                let cost = self.shaper.holding_cost(property.last_selling_price());
                if let Some(reward) = rewards.get_mut(owner) {
                    *reward -= cost;
                }
            }

            for (agent, action) in &decoded {
                let cash = self.cash_balance.entry(agent.clone()).or_insert(0.0);
                let reward = rewards.entry(agent.clone()).or_insert(0.0);
                match action {
                    Some(Action::Buy(target)) if *target == i => {
                        apply_buy(property, agent, cash, reward, &self.shaper);
                    }
                    Some(Action::Sell(target)) if *target == i => {
                        apply_sell(
                            property,
                            agent,
                            cash,
                            reward,
                            &self.shaper,
                            self.config.require_owner_to_sell,
                        );
                    }
                    _ => {}
                }
            }

            property.step(year, &mut self.rng);
        }

        for agent in &self.agents {
            let cash = self.cash_balance.get(agent).copied().unwrap_or(0.0);
            if let Some(reward) = rewards.get_mut(agent) {
                *reward += self.shaper.liquidity_bonus(cash);
            }
        }

        let mut terminations: BTreeMap<AgentId, bool> =
            self.agents.iter().map(|a| (a.clone(), false)).collect();
        let truncations: BTreeMap<AgentId, bool> =
            self.agents.iter().map(|a| (a.clone(), false)).collect();

        let observations = self.observations();
        let infos = self.infos();

        if self.timestep > self.config.horizon {
            terminations.values_mut().for_each(|t| *t = true);
            rewards.values_mut().for_each(|r| *r = 0.0);
            self.agents.clear();
            self.phase = EpisodePhase::Terminated;
            info!(
                timestep = self.timestep,
                cash = ?self.cash_balance,
                "Episode terminated at horizon"
            );
        } else {
            debug!(timestep = self.timestep, rewards = ?rewards, "Step complete");
        }

        Ok(StepResult {
            observations,
            rewards,
            terminations,
            truncations,
            infos,
        })
    }

    // -- Observations ----------------------------------------------------

    /// Advisory mask of legal actions for `agent` in the current state.
    pub fn action_mask(&self, agent: &str) -> Result<Vec<u8>, ReaxError> {
        self.ensure_known(agent)?;
        Ok(self.mask_for(agent))
    }

    /// Human-readable dump of the market state.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn observations(&self) -> Observations {
        self.agents
            .iter()
            .map(|agent| (agent.clone(), self.observation_for(agent)))
            .collect()
    }

    fn infos(&self) -> Infos {
        self.agents
            .iter()
            .map(|agent| {
                let owned_properties = self
                    .properties
                    .iter()
                    .filter(|p| p.owner() == Some(agent.as_str()))
                    .map(Property::id)
                    .collect();
                let info = AgentInfo {
                    timestep: self.timestep,
                    owned_properties,
                };
                (agent.clone(), info)
            })
            .collect()
    }

    fn observation_for(&self, agent: &str) -> Observation {
        Observation {
            cash_balance: self.cash_balance(agent).unwrap_or(0.0),
            properties: self
                .properties
                .iter()
                .map(|p| PropertyObservation {
                    owner: self.owner_index(p.owner()),
                    sale_price: p.last_selling_price(),
                })
                .collect(),
            action_mask: self.mask_for(agent),
        }
    }

    fn mask_for(&self, agent: &str) -> Vec<u8> {
        let cash = self.cash_balance(agent).unwrap_or(0.0);
        let mut mask = vec![0u8; self.action_space.n];
        mask[Action::HOLD_CODE] = 1;
        for (i, property) in self.properties.iter().enumerate() {
            match property.owner() {
                Some(owner) if owner == agent => mask[Action::sell_code(i)] = 1,
                None if property.last_selling_price() <= cash => mask[Action::buy_code(i)] = 1,
                _ => {}
            }
        }
        mask
    }

    /// `0` for unowned, otherwise the 1-based position in `possible_agents`.
    fn owner_index(&self, owner: Option<&str>) -> usize {
        owner
            .and_then(|o| self.possible_agents.iter().position(|a| a == o))
            .map_or(0, |i| i + 1)
    }

    // -- Helpers ---------------------------------------------------------

    fn year_at(&self, timestep: u64) -> u32 {
        let offset = u32::try_from(timestep).unwrap_or(u32::MAX);
        self.config.start_year.saturating_add(offset)
    }

    fn ensure_known(&self, agent: &str) -> Result<(), ReaxError> {
        if self.possible_agents.iter().any(|a| a == agent) {
            Ok(())
        } else {
            Err(ReaxError::UnknownAgent(agent.to_string()))
        }
    }

    fn validate_actions(&self, actions: &Actions) -> Result<(), ReaxError> {
        if let Some(unknown) = actions.keys().find(|a| !self.possible_agents.contains(a)) {
            return Err(ReaxError::UnknownAgent(unknown.clone()));
        }
        if let Some(missing) = self.agents.iter().find(|a| !actions.contains_key(*a)) {
            return Err(ReaxError::MissingAction(missing.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for MarketSimulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n===== Time Step {} =====", self.timestep)?;
        for agent in &self.agents {
            writeln!(
                f,
                "Agent: {agent} | Cash Balance: ${:.2}",
                self.cash_balance(agent).unwrap_or(0.0)
            )?;
        }
        writeln!(f, "\n----- Properties Market -----")?;
        for property in &self.properties {
            writeln!(f, "{property}")?;
        }
        writeln!(f, "\n==========================")
    }
}

// ---------------------------------------------------------------------------
// Action application
// ---------------------------------------------------------------------------

fn apply_buy(
    property: &mut Property,
    agent: &str,
    cash: &mut f64,
    reward: &mut f64,
    shaper: &RewardShaper,
) {
    if let Some(owner) = property.owner() {
        debug!(property = property.id(), agent, owner, "Buy skipped: already owned");
        return;
    }
    match property.buy(agent) {
        Ok(price) => {
            *cash -= price;
            *reward -= shaper.buy_penalty(price);
            debug!(property = property.id(), agent, price, cash = *cash, "Property bought");
        }
        Err(err) => debug!(property = property.id(), agent, %err, "Buy skipped"),
    }
}

/// Sell on behalf of `agent`.
///
/// Unless `require_owner` is set, the seller does not have to be the
/// owner: proceeds and the sale reward go to `agent` either way.
fn apply_sell(
    property: &mut Property,
    agent: &str,
    cash: &mut f64,
    reward: &mut f64,
    shaper: &RewardShaper,
    require_owner: bool,
) {
    match property.owner() {
        None => {
            debug!(property = property.id(), agent, "Sell skipped: not owned");
            return;
        }
        Some(owner) if owner != agent => {
            if require_owner {
                debug!(
                    property = property.id(),
                    agent,
                    owner,
                    "Sell skipped: seller is not the owner"
                );
                return;
            }
            warn!(property = property.id(), seller = agent, owner, "Sale by non-owner honoured");
        }
        Some(_) => {}
    }
    match property.sell() {
        Ok(profit) => {
            let proceeds = property.last_selling_price();
            *cash += proceeds;
            *reward += shaper.sale_reward(profit);
            debug!(
                property = property.id(),
                agent,
                proceeds,
                profit,
                cash = *cash,
                "Property sold"
            );
        }
        Err(err) => debug!(property = property.id(), agent, %err, "Sell skipped"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
