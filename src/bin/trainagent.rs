use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pursuit::agent::Agent;
use pursuit::config::{Config, DEFAULT_CONFIG_PATH};
use pursuit::TrainingProgress;

/// Train the chaser's Q-table headlessly and save it for the game.
#[derive(Parser, Debug)]
#[command(name = "trainagent", version)]
struct Args {
    /// TOML configuration file (missing file means defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Number of training episodes
    #[arg(long)]
    episodes: Option<u64>,

    /// Seed for reproducible training
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the trained brain (defaults to play.brain_path)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Train this many independent shards in parallel and average them
    #[arg(long)]
    shards: Option<usize>,

    /// Write progress checkpoints to this CSV file
    #[arg(long)]
    report_csv: Option<PathBuf>,

    /// Play this many greedy games against a random runner after training
    #[arg(long, default_value_t = 0)]
    evaluate: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(episodes) = args.episodes {
        config.training.episodes = episodes;
    }
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    if let Some(shards) = args.shards {
        config.training.shards = shards;
    }
    if let Some(output) = args.output {
        config.play.brain_path = output;
    }
    config.validate()?;

    let mut rng = match config.training.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    };
    let mut agent = Agent::from_config(&config)?;

    let summary = if config.training.shards > 1 {
        agent.train_parallel(config.training.shards, &mut rng)
    } else {
        agent.train(&mut rng, |_| {})
    };

    agent
        .store(&config.play.brain_path)
        .with_context(|| format!("saving brain to {}", config.play.brain_path.display()))?;

    if let Some(path) = &args.report_csv {
        write_report(path, &summary.checkpoints)?;
        log::info!("wrote {} checkpoints to {}", summary.checkpoints.len(), path.display());
    }

    if args.evaluate > 0 {
        let stats = agent.evaluate(args.evaluate, &mut rng);
        println!(
            "evaluation: {} games, chaser won {} ({:.1}%), runner won {}, {:.1} half-moves per game",
            stats.games,
            stats.chaser_wins,
            stats.chaser_win_rate() * 100.0,
            stats.runner_wins,
            stats.mean_half_moves()
        );
    }

    Ok(())
}

fn write_report(path: &Path, checkpoints: &[TrainingProgress]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for checkpoint in checkpoints {
        writer.serialize(checkpoint)?;
    }
    writer.flush()?;
    Ok(())
}
