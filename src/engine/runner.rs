//! Episode runner.
//!
//! Plays one full episode of a `ParallelEnv` with a `Policy` and collects
//! the outcome into an `EpisodeReport`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

use super::policy::Policy;
use crate::config::RunnerConfig;
use crate::env::ParallelEnv;
use crate::types::{Action, Actions, AgentId, ReaxError};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReport {
    pub seed: u64,
    pub policy: String,
    pub steps: u64,
    pub total_rewards: BTreeMap<AgentId, f64>,
    pub final_cash: BTreeMap<AgentId, f64>,
    /// Buy actions submitted, including ones the market skipped.
    pub buy_actions: u64,
    pub sell_actions: u64,
    /// Sum of all agents' rewards at each step.
    pub reward_history: Vec<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl EpisodeReport {
    pub fn total_reward(&self) -> f64 {
        self.total_rewards.values().sum()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl fmt::Display for EpisodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Episode seed={} policy={} steps={} buys={} sells={} ({} ms)",
            self.seed,
            self.policy,
            self.steps,
            self.buy_actions,
            self.sell_actions,
            self.duration_ms()
        )?;
        for (agent, reward) in &self.total_rewards {
            let cash = self.final_cash.get(agent).copied().unwrap_or(0.0);
            writeln!(f, "  {agent}: reward={reward:.4} cash=${cash:.2}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EpisodeRunner {
    /// Print the env every N steps; `0` disables rendering.
    render_every: u64,
}

impl EpisodeRunner {
    pub fn new(render_every: u64) -> Self {
        Self { render_every }
    }

    pub fn from_config(cfg: &RunnerConfig) -> Self {
        Self::new(cfg.render_every)
    }

    /// Reset `env` and step it until no agent is left.
    pub fn run<E: ParallelEnv + ?Sized>(
        &self,
        env: &mut E,
        policy: &mut dyn Policy,
        seed: Option<u64>,
    ) -> Result<EpisodeReport, ReaxError> {
        let started_at = Utc::now();
        let (mut observations, _) = env.reset(seed, None)?;
        let seed = env.seed().unwrap_or_default();

        let mut total_rewards: BTreeMap<AgentId, f64> =
            env.agents().iter().map(|a| (a.clone(), 0.0)).collect();
        let mut final_cash: BTreeMap<AgentId, f64> = observations
            .iter()
            .map(|(a, o)| (a.clone(), o.cash_balance))
            .collect();
        let mut reward_history: Vec<f64> = Vec::new();
        let mut buy_actions: u64 = 0;
        let mut sell_actions: u64 = 0;
        let mut steps: u64 = 0;

        while !env.agents().is_empty() {
            let mut actions = Actions::new();
            for agent in env.agents() {
                let code = match observations.get(agent) {
                    Some(obs) => policy.act(agent, obs),
                    None => Action::HOLD_CODE,
                };
                let property_count = (env.action_space(agent)?.n - 1) / 2;
                match Action::from_code(code, property_count) {
                    Some(Action::Buy(_)) => buy_actions += 1,
                    Some(Action::Sell(_)) => sell_actions += 1,
                    _ => {}
                }
                actions.insert(agent.clone(), code);
            }

            let result = env.step(&actions)?;
            steps += 1;

            for (agent, reward) in &result.rewards {
                *total_rewards.entry(agent.clone()).or_insert(0.0) += reward;
            }
            reward_history.push(result.rewards.values().sum());
            for (agent, obs) in &result.observations {
                final_cash.insert(agent.clone(), obs.cash_balance);
            }

            if self.render_every > 0 && steps % self.render_every == 0 {
                println!("{}", env.render());
            }
            observations = result.observations;
        }

        let report = EpisodeReport {
            seed,
            policy: policy.name().to_string(),
            steps,
            total_rewards,
            final_cash,
            buy_actions,
            sell_actions,
            reward_history,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            seed,
            policy = %report.policy,
            steps,
            total_reward = format!("{:.4}", report.total_reward()),
            buys = buy_actions,
            sells = sell_actions,
            "Episode complete"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
