//! End-to-end episodes through the public API.
//!
//! Drives the environment the way an agent driver would: reset, then
//! step with one action per active agent until termination.

use std::collections::BTreeSet;

use reaxland::config::AppConfig;
use reaxland::engine::{EpisodeRunner, HoldPolicy, Policy, RandomMaskedPolicy};
use reaxland::env::{parallel_api_check, ParallelEnv, ReaxLandEnv};
use reaxland::market::MarketSimulation;
use reaxland::property::models::ModelSelector;
use reaxland::property::{PriceJitter, PropertyFactory};
use reaxland::types::{Action, Actions, EpisodePhase, ReaxError};

use crate::fixed_model::{self, FixedPriceModel};

const INVESTOR: &str = "investor_agent";

fn single(code: usize) -> Actions {
    Actions::from([(INVESTOR.to_string(), code)])
}

fn multi_agent_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
        [market]
        agents = ["alice", "bob", "carol"]
        property_count = 4
        starting_cash = 1500000.0
        build_seed = 17
        "#,
    )
    .unwrap()
}

#[test]
fn test_buy_then_sell_scenario() {
    let mut env = ReaxLandEnv::new(&AppConfig::default()).unwrap();
    let (obs, _) = env.reset(Some(42), None).unwrap();
    assert_eq!(obs[INVESTOR].cash_balance, 100_000.0);

    env.step(&single(Action::buy_code(0))).unwrap();
    let sim = env.simulation();
    let after_buy = sim.cash_balance(INVESTOR).unwrap();
    assert!(after_buy < 100_000.0);
    assert_eq!(sim.property(0).unwrap().owner(), Some(INVESTOR));

    let result = env.step(&single(Action::sell_code(0))).unwrap();
    let sim = env.simulation();
    assert_eq!(sim.property(0).unwrap().owner(), None);
    assert!(sim.cash_balance(INVESTOR).unwrap() >= after_buy);
    assert_eq!(result.observations[INVESTOR].properties[0].owner, 0);
}

#[test]
fn test_same_seed_same_trajectory() {
    let config = multi_agent_config();
    let run = || {
        let mut env = ReaxLandEnv::new(&config).unwrap();
        let mut policy = RandomMaskedPolicy::new(99);
        let (mut obs, _) = env.reset(Some(2024), None).unwrap();
        let mut results = Vec::new();
        while !env.agents().is_empty() {
            let actions: Actions = env
                .agents()
                .iter()
                .map(|a| (a.clone(), policy.act(a, &obs[a])))
                .collect();
            let result = env.step(&actions).unwrap();
            obs = result.observations.clone();
            results.push(result);
        }
        results
    };

    let a = run();
    let b = run();
    assert_eq!(a.len(), 101);
    assert_eq!(a, b);
}

#[test]
fn test_reset_with_same_seed_is_reproducible() {
    let mut env = ReaxLandEnv::new(&multi_agent_config()).unwrap();
    let (first, first_infos) = env.reset(Some(7), None).unwrap();
    for _ in 0..10 {
        let actions: Actions = env.agents().iter().map(|a| (a.clone(), 1)).collect();
        env.step(&actions).unwrap();
    }
    let (second, second_infos) = env.reset(Some(7), None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first_infos, second_infos);
}

#[test]
fn test_episode_ends_after_101_steps() {
    let mut env = ReaxLandEnv::new(&AppConfig::default()).unwrap();
    env.reset(Some(1), None).unwrap();

    let mut last = None;
    for _ in 0..101 {
        last = Some(env.step(&single(0)).unwrap());
    }
    let last = last.unwrap();

    assert!(last.terminations.values().all(|&t| t));
    assert!(last.rewards.values().all(|&r| r == 0.0));
    assert!(env.agents().is_empty());
    assert_eq!(env.simulation().phase(), EpisodePhase::Terminated);
    assert_eq!(env.step(&single(0)).unwrap_err(), ReaxError::EpisodeOver);

    // A new episode starts cleanly.
    env.reset(Some(2), None).unwrap();
    assert_eq!(env.agents().len(), 1);
    assert_eq!(env.simulation().timestep(), 0);
}

#[test]
fn test_masks_and_ownership_stay_consistent() {
    let mut env = ReaxLandEnv::new(&multi_agent_config()).unwrap();
    let mut policy = RandomMaskedPolicy::new(3);
    let (mut obs, _) = env.reset(Some(5), None).unwrap();

    while !env.agents().is_empty() {
        let actions: Actions = env
            .agents()
            .iter()
            .map(|a| (a.clone(), policy.act(a, &obs[a])))
            .collect();
        let result = env.step(&actions).unwrap();
        let sim = env.simulation();

        let mut owned = BTreeSet::new();
        for info in result.infos.values() {
            for id in &info.owned_properties {
                assert!(owned.insert(*id), "property {id} owned twice");
            }
        }

        for (agent, o) in &result.observations {
            let cash = sim.cash_balance(agent).unwrap();
            assert!(cash >= 0.0, "masked play never overspends");
            for (i, p) in sim.properties().iter().enumerate() {
                let can_sell = p.owner() == Some(agent.as_str());
                let can_buy = p.owner().is_none() && p.last_selling_price() <= cash;
                assert_eq!(o.is_legal(Action::sell_code(i)), can_sell);
                assert_eq!(o.is_legal(Action::buy_code(i)), can_buy);
            }
            assert!(o.is_legal(Action::HOLD_CODE));
        }
        obs = result.observations;
    }
}

#[test]
fn test_parallel_api_check_passes() {
    let mut env = ReaxLandEnv::new(&multi_agent_config()).unwrap();
    let report = parallel_api_check(&mut env, 300, 11).unwrap();
    assert_eq!(report.steps, 300);
    assert_eq!(report.episodes, 3);
}

#[test]
fn test_injected_model_prices_properties() {
    let registry = FixedPriceModel::registry(50_000.0);
    let factory = PropertyFactory::new(registry, ModelSelector::Named(fixed_model::NAME.into()))
        .with_jitter(PriceJitter { low: 1.0, high: 1.0 + 1e-12 })
        .unwrap();
    assert_eq!(factory.registry().names(), vec![fixed_model::NAME]);

    let mut config = AppConfig::default();
    config.market.property_count = 6;
    let mut sim = MarketSimulation::with_factory(&config, &factory).unwrap();
    sim.reset(Some(0), None).unwrap();

    for p in sim.properties() {
        assert_eq!(p.model_name(), fixed_model::NAME);
        assert_eq!(p.base_price(), f64::from(p.features().bedrooms) * 50_000.0);
        assert!((p.price() / p.base_price() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_hold_runner_over_configured_market() {
    let mut env = ReaxLandEnv::new(&multi_agent_config()).unwrap();
    let report = EpisodeRunner::new(0)
        .run(&mut env, &mut HoldPolicy, Some(3))
        .unwrap();
    assert_eq!(report.steps, 101);
    assert_eq!(report.final_cash.len(), 3);
    assert!(report.final_cash.values().all(|&c| c == 1_500_000.0));
}

#[test]
fn test_unseeded_reset_records_seed() {
    let mut env = ReaxLandEnv::new(&AppConfig::default()).unwrap();
    let (obs, _) = env.reset(None, None).unwrap();
    let seed = env.seed().unwrap();

    let (replayed, _) = env.reset(Some(seed), None).unwrap();
    assert_eq!(obs, replayed);
}
