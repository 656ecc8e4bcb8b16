//! ReaXLand — real-estate market simulation
//!
//! Entry point. Loads configuration, initialises structured logging,
//! then plays the configured number of episodes and reports on each.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reaxland::config::AppConfig;
use reaxland::engine::{policy_from_name, EpisodeReport, EpisodeRunner};
use reaxland::env::{ParallelEnv, ReaxLandEnv};

const BANNER: &str = r#"
 ____            __  ___                    _
|  _ \ ___  __ _ \ \/ / |    __ _ _ __   __| |
| |_) / _ \/ _` | \  /| |   / _` | '_ \ / _` |
|  _ <  __/ (_| | /  \| |__| (_| | | | | (_| |
|_| \_\___|\__,_|/_/\_\_____\__,_|_| |_|\__,_|

  Real-estate market simulation
  v0.1.0
"#;

const DEFAULT_CONFIG: &str = "config.toml";

/// Run ReaXLand episodes from the command line
#[derive(Parser, Debug)]
#[command(name = "reaxland")]
#[command(version)]
struct Args {
    /// TOML config file (defaults to ./config.toml when present)
    #[arg(long, env = "REAXLAND_CONFIG")]
    config: Option<PathBuf>,

    /// Seed of the first episode; later episodes use seed + n
    #[arg(long)]
    seed: Option<u64>,

    /// Number of episodes to play
    #[arg(long)]
    episodes: Option<u32>,

    /// Policy driving every agent: hold | random
    #[arg(long)]
    policy: Option<String>,

    /// Print the market every N steps (0 = never)
    #[arg(long)]
    render_every: Option<u64>,

    /// Print episode reports as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();

    // Initialise structured logging
    init_logging();

    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(episodes) = args.episodes {
        cfg.runner.episodes = episodes;
    }
    if let Some(policy) = args.policy {
        cfg.runner.policy = policy;
    }
    if let Some(render_every) = args.render_every {
        cfg.runner.render_every = render_every;
    }

    if !args.json {
        println!("{BANNER}");
    }
    info!(
        agents = ?cfg.market.agents,
        properties = cfg.market.property_count,
        horizon = cfg.market.horizon,
        starting_cash = cfg.market.starting_cash,
        policy = %cfg.runner.policy,
        episodes = cfg.runner.episodes,
        "ReaXLand starting up"
    );

    let mut env = ReaxLandEnv::new(&cfg).context("Failed to build market")?;
    let runner = EpisodeRunner::from_config(&cfg.runner);
    let mut policy = policy_from_name(&cfg.runner.policy, args.seed.unwrap_or_default())?;

    let mut reports: Vec<EpisodeReport> = Vec::new();
    for episode in 0..cfg.runner.episodes {
        let seed = args.seed.map(|s| s.wrapping_add(u64::from(episode)));
        let report = runner
            .run(&mut env, policy.as_mut(), seed)
            .with_context(|| format!("Episode {episode} failed"))?;
        if !args.json {
            print!("{report}");
        }
        reports.push(report);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    let mean = if reports.is_empty() {
        0.0
    } else {
        reports.iter().map(EpisodeReport::total_reward).sum::<f64>() / reports.len() as f64
    };
    info!(
        env = env.metadata().name,
        episodes = reports.len(),
        mean_reward = format!("{mean:.4}"),
        "ReaXLand finished"
    );

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::load(DEFAULT_CONFIG),
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(AppConfig::default())
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reaxland=info"));

    let json_logging = std::env::var("REAXLAND_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
