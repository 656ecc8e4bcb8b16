//! Parallel multi-agent environment surface.
//!
//! `ParallelEnv` is the reset/step protocol every agent-facing driver talks
//! to. `ReaxLandEnv` implements it over a `MarketSimulation`, and
//! `parallel_api_check` exercises any implementation against the protocol.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::engine::policy::{Policy, RandomMaskedPolicy};
use crate::market::spaces::{DiscreteSpace, ObservationSpace};
use crate::market::MarketSimulation;
use crate::types::{
    Actions, AgentId, Infos, Observations, ReaxError, ResetOptions, StepResult,
};

/// Static description of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMetadata {
    pub name: &'static str,
    pub render_modes: &'static [&'static str],
}

pub const METADATA: EnvMetadata = EnvMetadata {
    name: "reaXLand",
    render_modes: &["human"],
};

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Simultaneous-action environment: every active agent acts each step.
pub trait ParallelEnv {
    fn metadata(&self) -> EnvMetadata;

    fn possible_agents(&self) -> &[AgentId];

    /// Agents still active in the current episode.
    fn agents(&self) -> &[AgentId];

    /// Seed of the current episode, once reset.
    fn seed(&self) -> Option<u64>;

    fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<ResetOptions>,
    ) -> Result<(Observations, Infos), ReaxError>;

    fn step(&mut self, actions: &Actions) -> Result<StepResult, ReaxError>;

    fn action_space(&self, agent: &str) -> Result<&DiscreteSpace, ReaxError>;

    fn observation_space(&self, agent: &str) -> Result<&ObservationSpace, ReaxError>;

    fn render(&self) -> String;
}

// ---------------------------------------------------------------------------
// ReaXLand environment
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ReaxLandEnv {
    sim: MarketSimulation,
}

impl ReaxLandEnv {
    pub fn new(config: &AppConfig) -> Result<Self, ReaxError> {
        Ok(Self::from_simulation(MarketSimulation::new(config)?))
    }

    pub fn from_simulation(sim: MarketSimulation) -> Self {
        Self { sim }
    }

    pub fn simulation(&self) -> &MarketSimulation {
        &self.sim
    }
}

impl ParallelEnv for ReaxLandEnv {
    fn metadata(&self) -> EnvMetadata {
        METADATA
    }

    fn possible_agents(&self) -> &[AgentId] {
        self.sim.possible_agents()
    }

    fn agents(&self) -> &[AgentId] {
        self.sim.agents()
    }

    fn seed(&self) -> Option<u64> {
        self.sim.seed()
    }

    fn reset(
        &mut self,
        seed: Option<u64>,
        options: Option<ResetOptions>,
    ) -> Result<(Observations, Infos), ReaxError> {
        self.sim.reset(seed, options)
    }

    fn step(&mut self, actions: &Actions) -> Result<StepResult, ReaxError> {
        self.sim.step(actions)
    }

    fn action_space(&self, agent: &str) -> Result<&DiscreteSpace, ReaxError> {
        self.sim.action_space(agent)
    }

    fn observation_space(&self, agent: &str) -> Result<&ObservationSpace, ReaxError> {
        self.sim.observation_space(agent)
    }

    fn render(&self) -> String {
        self.sim.render()
    }
}

// ---------------------------------------------------------------------------
// Conformance check
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiCheckError {
    #[error(transparent)]
    Env(#[from] ReaxError),

    #[error("Protocol violation at step {step}: {detail}")]
    Violation { step: u64, detail: String },
}

/// Summary of a successful conformance run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiCheckReport {
    pub steps: u64,
    pub episodes: u64,
    pub observations_checked: u64,
}

fn violation(step: u64, detail: impl Into<String>) -> ApiCheckError {
    ApiCheckError::Violation {
        step,
        detail: detail.into(),
    }
}

/// Drive `env` for `cycles` steps with masked random actions, checking the
/// parallel protocol after every reset and step. Finished episodes are
/// reset with the next seed.
pub fn parallel_api_check<E: ParallelEnv + ?Sized>(
    env: &mut E,
    cycles: u64,
    seed: u64,
) -> Result<ApiCheckReport, ApiCheckError> {
    let mut report = ApiCheckReport::default();
    let mut policy = RandomMaskedPolicy::new(seed);

    let (first, _) = env.reset(Some(seed), None)?;
    let (mut observations, infos) = env.reset(Some(seed), None)?;
    if first != observations {
        return Err(violation(0, "reset with the same seed produced different observations"));
    }
    if env.seed() != Some(seed) {
        return Err(violation(0, "env does not report the seed it was reset with"));
    }
    check_keys(0, env.agents(), infos.keys(), "infos")?;
    report.observations_checked += check_observations(env, 0, &observations)?;
    report.episodes = 1;

    let possible: BTreeSet<AgentId> = env.possible_agents().iter().cloned().collect();
    let mut episode_seed = seed;

    for step in 1..=cycles {
        let active: Vec<AgentId> = env.agents().to_vec();
        if let Some(stray) = active.iter().find(|a| !possible.contains(*a)) {
            return Err(violation(step, format!("active agent {stray} is not a possible agent")));
        }

        let mut actions = Actions::new();
        for agent in &active {
            let obs = observations
                .get(agent)
                .ok_or_else(|| violation(step, format!("no observation for {agent}")))?;
            let code = policy.act(agent, obs);
            if !obs.is_legal(code) || !env.action_space(agent)?.contains(code) {
                return Err(violation(
                    step,
                    format!("masked action {code} is not legal for {agent}"),
                ));
            }
            actions.insert(agent.clone(), code);
        }

        let result = env.step(&actions)?;
        report.steps += 1;

        check_keys(step, &active, result.rewards.keys(), "rewards")?;
        check_keys(step, &active, result.terminations.keys(), "terminations")?;
        check_keys(step, &active, result.truncations.keys(), "truncations")?;
        check_keys(step, &active, result.observations.keys(), "observations")?;
        check_keys(step, &active, result.infos.keys(), "infos")?;
        report.observations_checked += check_observations(env, step, &result.observations)?;

        for (agent, &done) in &result.terminations {
            let truncated = result.truncations.get(agent).copied().unwrap_or(false);
            if (done || truncated) && env.agents().contains(agent) {
                return Err(violation(step, format!("finished agent {agent} is still active")));
            }
        }

        if result.is_done() != env.agents().is_empty() {
            return Err(violation(
                step,
                "termination flags disagree with the active agent list",
            ));
        }

        if env.agents().is_empty() {
            episode_seed = episode_seed.wrapping_add(1);
            debug!(step, next_seed = episode_seed, "Episode finished, resetting");
            let (obs, _) = env.reset(Some(episode_seed), None)?;
            report.episodes += 1;
            report.observations_checked += check_observations(env, step, &obs)?;
            observations = obs;
        } else {
            observations = result.observations;
        }
    }

    info!(
        env = env.metadata().name,
        steps = report.steps,
        episodes = report.episodes,
        observations = report.observations_checked,
        "Parallel API check passed"
    );
    Ok(report)
}

fn check_keys<'a>(
    step: u64,
    expected: &[AgentId],
    actual: impl Iterator<Item = &'a AgentId>,
    what: &str,
) -> Result<(), ApiCheckError> {
    let expected: BTreeSet<&AgentId> = expected.iter().collect();
    let actual: BTreeSet<&AgentId> = actual.collect();
    if expected == actual {
        Ok(())
    } else {
        Err(violation(
            step,
            format!("{what} keyed by {actual:?}, expected {expected:?}"),
        ))
    }
}

fn check_observations<E: ParallelEnv + ?Sized>(
    env: &E,
    step: u64,
    observations: &Observations,
) -> Result<u64, ApiCheckError> {
    for (agent, obs) in observations {
        let space = env.observation_space(agent)?;
        if !space.contains(obs) {
            return Err(violation(step, format!("observation of {agent} outside its space: {obs}")));
        }
        let n = env.action_space(agent)?.n;
        if obs.action_mask.len() != n {
            return Err(violation(
                step,
                format!(
                    "mask of {agent} has {} entries, action space has {n}",
                    obs.action_mask.len()
                ),
            ));
        }
    }
    Ok(observations.len() as u64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
