pub mod qtable;
pub mod exploration;
pub mod persistence;

use std::path::Path;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use exploration::{random_action, select_action};
use qtable::{StateKey, ValueTable};
use crate::config::{Config, TrainingConfig};
use crate::error::Result;
use crate::game::{Actor, Game, GameState, Outcome};
use crate::grid::Action;
use crate::reward::RewardScheme;

/// Snapshot emitted every `report_interval` episodes. Win counts cover the
/// episodes since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingProgress {
    pub shard: usize,
    pub episode: u64,
    pub total_episodes: u64,
    pub elapsed_secs: f64,
    pub epsilon: f64,
    pub states: usize,
    pub chaser_wins: u64,
    pub runner_wins: u64
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub episodes: u64,
    pub elapsed: Duration,
    pub final_epsilon: f64,
    pub chaser_wins: u64,
    pub runner_wins: u64,
    pub checkpoints: Vec<TrainingProgress>
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EvaluationStats {
    pub games: u64,
    pub chaser_wins: u64,
    pub runner_wins: u64,
    pub half_moves: u64
}

impl EvaluationStats {
    pub fn chaser_win_rate(&self) -> f64 {
        if self.games == 0 { 0.0 } else { self.chaser_wins as f64 / self.games as f64 }
    }

    pub fn mean_half_moves(&self) -> f64 {
        if self.games == 0 { 0.0 } else { self.half_moves as f64 / self.games as f64 }
    }
}

/// Tabular Q-learning chaser trained against a uniformly random runner.
#[derive(Debug, Clone)]
pub struct Agent {
    table: ValueTable,
    game: Game,
    rewards: RewardScheme,
    params: TrainingConfig
}

impl Agent {
    pub fn new(game: Game, rewards: RewardScheme, params: TrainingConfig) -> Self {
        Self {
            table: ValueTable::new(),
            game,
            rewards,
            params
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(Game::new(config.grid()?), config.rewards, config.training.clone()))
    }

    pub fn with_table(mut self, table: ValueTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &ValueTable {&self.table}
    pub fn game(&self) -> &Game {&self.game}
    pub fn params(&self) -> &TrainingConfig {&self.params}

    /// Greedy action for the chaser (no exploration).
    pub fn get_action<R: Rng>(&mut self, state: &GameState, rng: &mut R) -> Action {
        let grid = *self.game.grid();
        select_action(&mut self.table, &grid, state.key(), 0.0, rng)
    }

    pub fn train<R: Rng>(&mut self, rng: &mut R, on_progress: impl FnMut(&TrainingProgress)) -> TrainingSummary {
        log::info!(
            "training for {} episodes on a {}x{} grid",
            self.params.episodes,
            self.game.grid().size(),
            self.game.grid().size()
        );
        let summary = self.train_episodes(self.params.episodes, 0, rng, on_progress);
        log_summary(&summary, self.table.len());
        summary
    }

    /// Trains `shards` independent copies of the current table on equal
    /// slices of the episode budget, then averages them back into this agent.
    /// Workers never share a table.
    pub fn train_parallel<R: Rng>(&mut self, shards: usize, rng: &mut R) -> TrainingSummary {
        let shards = shards.max(1);
        let start = Instant::now();
        let total = self.params.episodes;
        let base = total / shards as u64;
        let remainder = total % shards as u64;

        let jobs: Vec<(usize, u64, u64)> = (0..shards)
            .map(|i| {
                let episodes = base + u64::from((i as u64) < remainder);
                (i, episodes, rng.random::<u64>())
            })
            .collect();

        log::info!("training for {} episodes across {} shards", total, shards);

        let results: Vec<(ValueTable, TrainingSummary)> = jobs
            .into_par_iter()
            .map(|(shard, episodes, seed)| {
                let mut worker = self.clone();
                let mut shard_rng = ChaCha8Rng::seed_from_u64(seed);
                let summary = worker.train_episodes(episodes, shard, &mut shard_rng, |_| {});
                log::debug!("shard {} finished with {} states", shard, worker.table.len());
                (worker.table, summary)
            })
            .collect();

        let mut summary = TrainingSummary {
            episodes: 0,
            elapsed: Duration::ZERO,
            final_epsilon: self.params.min_epsilon,
            chaser_wins: 0,
            runner_wins: 0,
            checkpoints: Vec::new()
        };
        let mut tables = Vec::with_capacity(results.len());
        for (table, shard_summary) in results {
            summary.episodes += shard_summary.episodes;
            summary.final_epsilon = summary.final_epsilon.max(shard_summary.final_epsilon);
            summary.chaser_wins += shard_summary.chaser_wins;
            summary.runner_wins += shard_summary.runner_wins;
            summary.checkpoints.extend(shard_summary.checkpoints);
            tables.push(table);
        }

        self.table = ValueTable::merge(tables);
        summary.elapsed = start.elapsed();
        log_summary(&summary, self.table.len());
        summary
    }

    fn train_episodes<R: Rng>(
        &mut self,
        episodes: u64,
        shard: usize,
        rng: &mut R,
        mut on_progress: impl FnMut(&TrainingProgress),
    ) -> TrainingSummary {
        let schedule = self.params.epsilon_schedule();
        let start = Instant::now();
        let mut epsilon = schedule.initial;
        let mut chaser_wins = 0;
        let mut runner_wins = 0;
        let mut window = (0u64, 0u64);
        let mut checkpoints = Vec::new();

        for episode in 0..episodes {
            match self.run_episode(epsilon, rng) {
                Outcome::ChaserWon => {
                    chaser_wins += 1;
                    window.0 += 1;
                }
                Outcome::RunnerWon => {
                    runner_wins += 1;
                    window.1 += 1;
                }
                Outcome::InProgress => {}
            }

            epsilon = schedule.next(epsilon);

            // an interval of 0 disables reporting
            if (episode + 1).checked_rem(self.params.report_interval) == Some(0) {
                let progress = TrainingProgress {
                    shard,
                    episode: episode + 1,
                    total_episodes: episodes,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                    epsilon,
                    states: self.table.len(),
                    chaser_wins: window.0,
                    runner_wins: window.1
                };
                log::info!(
                    "...training {}/{} complete ({:.1}s, epsilon {:.4}, {} states, chaser {} / runner {})",
                    progress.episode,
                    progress.total_episodes,
                    progress.elapsed_secs,
                    progress.epsilon,
                    progress.states,
                    progress.chaser_wins,
                    progress.runner_wins
                );
                on_progress(&progress);
                checkpoints.push(progress);
                window = (0, 0);
            }
        }

        TrainingSummary {
            episodes,
            elapsed: start.elapsed(),
            final_epsilon: epsilon,
            chaser_wins,
            runner_wins,
            checkpoints
        }
    }

    // one game from the initial state; returns the terminal outcome
    fn run_episode<R: Rng>(&mut self, epsilon: f64, rng: &mut R) -> Outcome {
        let grid = *self.game.grid();
        let mut state = self.game.initial_state();
        let mut last_decision: Option<(StateKey, Action, f64)> = None;

        loop {
            let outcome = match state.turn {
                Actor::Chaser => {
                    let key = state.key();
                    let action = select_action(&mut self.table, &grid, key, epsilon, rng);
                    let next = self.game.apply_move(&state, Actor::Chaser, action);
                    let outcome = self.game.outcome(&next);

                    let old = self.table.value(&key, action);
                    self.learn_from_move(&state, action, &next, outcome);
                    last_decision = Some((key, action, old));
                    state = next;
                    outcome
                }
                Actor::Runner => {
                    let action = random_action(&grid, state.runner, rng);
                    state = self.game.apply_move(&state, Actor::Runner, action);
                    let outcome = self.game.outcome(&state);

                    if outcome == Outcome::RunnerWon {
                        if let Some((key, action, old)) = last_decision {
                            self.penalize_escape(key, action, old);
                        }
                    }
                    outcome
                }
            };

            if outcome.is_terminal() {
                return outcome;
            }
        }
    }

    /// One-step Q-learning backup for a chaser move from `previous` to `next`.
    fn learn_from_move(&mut self, previous: &GameState, action: Action, next: &GameState, outcome: Outcome) -> f64 {
        let reward = self.rewards.reward(previous, next, outcome);
        let future = if outcome.is_terminal() {
            0.0
        } else {
            let next_moves = self.game.grid().valid_moves(next.chaser);
            self.params.discount_factor * self.table.max_value(next.key(), &next_moves)
        };
        self.table.update(previous.key(), action, reward + future, self.params.learning_rate)
    }

    // the runner escaped on its half-turn; the chaser's last decision is
    // re-backed from `old`, its value before that move's own update, with the
    // escape penalty as a terminal target
    fn penalize_escape(&mut self, key: StateKey, action: Action, old: f64) -> f64 {
        let patched = old + self.params.learning_rate * (self.rewards.escape - old);
        self.table.set(key, action, patched);
        patched
    }

    /// Plays greedy games against the random runner without learning.
    pub fn evaluate<R: Rng>(&mut self, games: u64, rng: &mut R) -> EvaluationStats {
        let grid = *self.game.grid();
        let mut stats = EvaluationStats { games, ..Default::default() };

        for _ in 0..games {
            let mut state = self.game.initial_state();
            loop {
                let (actor, action) = match state.turn {
                    Actor::Chaser => (Actor::Chaser, self.get_action(&state, rng)),
                    Actor::Runner => (Actor::Runner, random_action(&grid, state.runner, rng)),
                };
                state = self.game.apply_move(&state, actor, action);
                stats.half_moves += 1;

                match self.game.outcome(&state) {
                    Outcome::ChaserWon => {
                        stats.chaser_wins += 1;
                        break;
                    }
                    Outcome::RunnerWon => {
                        stats.runner_wins += 1;
                        break;
                    }
                    Outcome::InProgress => {}
                }
            }
        }

        stats
    }

    pub fn store(&self, path: &Path) -> Result<()> {
        persistence::save(&self.table, self.game.grid(), path)
    }

    pub fn load(config: &Config, path: &Path) -> Result<Self> {
        let agent = Self::from_config(config)?;
        let table = persistence::load(agent.game.grid(), path)?;
        Ok(agent.with_table(table))
    }

    /// Trains a fresh agent from `config` and saves it to `play.brain_path`.
    /// A save failure is an error; the trained table is not handed back.
    pub fn train_and_store<R: Rng>(config: &Config, rng: &mut R) -> Result<Self> {
        let mut agent = Self::from_config(config)?;
        if config.training.shards > 1 {
            agent.train_parallel(config.training.shards, rng);
        } else {
            agent.train(rng, |_| {});
        }
        agent.store(&config.play.brain_path)?;
        Ok(agent)
    }
}

fn log_summary(summary: &TrainingSummary, states: usize) {
    log::info!(
        "training complete: {} episodes in {:.2}s, epsilon {:.4}, {} states (chaser {} / runner {})",
        summary.episodes,
        summary.elapsed.as_secs_f64(),
        summary.final_epsilon,
        states,
        summary.chaser_wins,
        summary.runner_wins
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, Position};

    fn small_agent(size: i32, episodes: u64, decay: f64) -> Agent {
        let params = TrainingConfig {
            episodes,
            epsilon_decay: decay,
            report_interval: episodes / 4,
            ..TrainingConfig::default()
        };
        Agent::new(Game::new(Grid::new(size).unwrap()), RewardScheme::default(), params)
    }

    fn state(chaser: (i32, i32), runner: (i32, i32), turn: Actor) -> GameState {
        GameState {
            chaser: Position::new(chaser.0, chaser.1),
            runner: Position::new(runner.0, runner.1),
            turn
        }
    }

    #[test]
    fn test_bellman_update_non_terminal() {
        let mut agent = small_agent(7, 10, 0.99);
        let before = state((6, 6), (2, 2), Actor::Chaser);
        let after = state((5, 6), (2, 2), Actor::Runner);

        agent.table.set(after.key(), Action::Left, 10.0);
        agent.table.set(after.key(), Action::Down, 40.0);

        let new = agent.learn_from_move(&before, Action::Up, &after, Outcome::InProgress);
        // 0 + 0.1 * (-1 + 0.95 * 40 - 0) = 3.7
        assert!((new - 3.7).abs() < 1e-9);
        assert!((agent.table.value(&before.key(), Action::Up) - 3.7).abs() < 1e-9);
    }

    #[test]
    fn test_bellman_update_ignores_illegal_next_actions() {
        let mut agent = small_agent(7, 10, 0.99);
        let before = state((5, 6), (0, 0), Actor::Chaser);
        let after = state((6, 6), (0, 0), Actor::Runner);

        // RIGHT and DOWN are off the board from (6, 6)
        agent.table.set(after.key(), Action::Right, 500.0);
        agent.table.set(after.key(), Action::Down, 500.0);
        agent.table.set(after.key(), Action::Stay, 20.0);

        let new = agent.learn_from_move(&before, Action::Down, &after, Outcome::InProgress);
        // 0.1 * (-1 + 0.95 * 20) = 1.8
        assert!((new - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_terminal_catch_uses_reward_only() {
        let mut agent = small_agent(7, 10, 0.99);
        let before = state((5, 5), (5, 4), Actor::Chaser);
        let after = state((5, 4), (5, 4), Actor::Runner);
        agent.table.set(after.key(), Action::Stay, 1000.0);

        let new = agent.learn_from_move(&before, Action::Left, &after, Outcome::ChaserWon);
        assert!((new - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_escape_patches_last_decision() {
        let mut agent = small_agent(7, 10, 0.99);
        let key = state((5, 6), (6, 5), Actor::Chaser).key();
        agent.table.set(key, Action::Up, 10.0);

        let new = agent.penalize_escape(key, Action::Up, 10.0);
        // 10 + 0.1 * (-200 - 10) = -11
        assert!((new + 11.0).abs() < 1e-9);
        assert!((agent.table.value(&key, Action::Up) + 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_escape_replaces_the_ordinary_backup() {
        let mut agent = small_agent(7, 10, 0.99);
        let before = state((6, 6), (6, 4), Actor::Chaser);
        let after = state((5, 6), (6, 4), Actor::Runner);
        agent.table.set(before.key(), Action::Up, 10.0);
        agent.table.set(after.key(), Action::Stay, 50.0);

        let old = agent.table.value(&before.key(), Action::Up);
        let backed = agent.learn_from_move(&before, Action::Up, &after, Outcome::InProgress);
        // 10 + 0.1 * (-1 + 0.95 * 50 - 10) = 13.65
        assert!((backed - 13.65).abs() < 1e-9);

        // runner steps onto the vacated exit
        let patched = agent.penalize_escape(before.key(), Action::Up, old);
        assert!((patched + 11.0).abs() < 1e-9);
        assert!((agent.table.value(&before.key(), Action::Up) + 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_report_interval_trains_silently() {
        let mut agent = small_agent(3, 100, 0.99);
        agent.params.report_interval = 0;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut reports = 0;

        let summary = agent.train(&mut rng, |_| reports += 1);

        assert_eq!(summary.episodes, 100);
        assert_eq!(reports, 0);
        assert!(summary.checkpoints.is_empty());
    }

    #[test]
    fn test_converged_value_is_stable() {
        let mut agent = small_agent(7, 10, 0.99);
        let before = state((5, 5), (5, 4), Actor::Chaser);
        let after = state((5, 4), (5, 4), Actor::Runner);
        agent.table.set(before.key(), Action::Left, 200.0);

        for _ in 0..50 {
            agent.learn_from_move(&before, Action::Left, &after, Outcome::ChaserWon);
        }
        assert_eq!(agent.table.value(&before.key(), Action::Left), 200.0);
    }

    #[test]
    fn test_train_runs_every_episode() {
        let mut agent = small_agent(3, 2000, 0.998);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut reports = Vec::new();

        let summary = agent.train(&mut rng, |p| reports.push(p.episode));

        assert_eq!(summary.episodes, 2000);
        assert_eq!(summary.chaser_wins + summary.runner_wins, 2000);
        assert_eq!(reports, vec![500, 1000, 1500, 2000]);
        assert_eq!(summary.checkpoints.len(), 4);
        assert!(!agent.table().is_empty());
        assert!(agent.table().len() <= 81);

        let expected = agent.params().epsilon_schedule().after(2000);
        assert!((summary.final_epsilon - expected).abs() < 1e-9);
    }

    #[test]
    fn test_training_is_reproducible() {
        let run = || {
            let mut agent = small_agent(3, 500, 0.99);
            let mut rng = ChaCha8Rng::seed_from_u64(99);
            agent.train(&mut rng, |_| {});
            agent.table
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_trained_policy_at_exit() {
        let mut agent = small_agent(3, 30_000, 0.9997);
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        agent.train(&mut rng, |_| {});

        // a runner next to the exit is taken rather than waited for
        let above = state((2, 2), (1, 2), Actor::Chaser);
        let beside = state((2, 2), (2, 1), Actor::Chaser);
        for _ in 0..20 {
            assert_eq!(agent.get_action(&above, &mut rng), Action::Up);
            assert_eq!(agent.get_action(&beside, &mut rng), Action::Left);
        }

        let grid = *agent.game().grid();
        let exit_moves = grid.valid_moves(grid.exit());
        for runner in grid.positions().filter(|&p| p != grid.exit()) {
            let at_exit = GameState { chaser: grid.exit(), runner, turn: Actor::Chaser };
            assert!(exit_moves.contains(&agent.get_action(&at_exit, &mut rng)));
        }
    }

    #[test]
    fn test_evaluate_counts_every_game() {
        let mut agent = small_agent(3, 3000, 0.998);
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        agent.train(&mut rng, |_| {});

        let stats = agent.evaluate(200, &mut rng);
        assert_eq!(stats.games, 200);
        assert_eq!(stats.chaser_wins + stats.runner_wins, 200);
        assert!(stats.half_moves >= 200);
        assert!(stats.chaser_win_rate() >= 0.0 && stats.chaser_win_rate() <= 1.0);
    }

    #[test]
    fn test_parallel_training_merges_shards() {
        let run = || {
            let mut agent = small_agent(3, 2001, 0.998);
            let mut rng = ChaCha8Rng::seed_from_u64(8);
            let summary = agent.train_parallel(3, &mut rng);
            (agent.table, summary.episodes, summary.chaser_wins + summary.runner_wins)
        };

        let (table, episodes, finished) = run();
        assert_eq!(episodes, 2001);
        assert_eq!(finished, 2001);
        assert!(!table.is_empty());
        assert_eq!(run().0, table);
    }

    #[test]
    fn test_store_and_load() {
        let mut agent = small_agent(3, 200, 0.99);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        agent.train(&mut rng, |_| {});

        let mut config = Config::default();
        config.grid.size = 3;
        let path = std::env::temp_dir().join(format!("pursuit_agent_{}.json", std::process::id()));

        agent.store(&path).unwrap();
        let loaded = Agent::load(&config, &path).unwrap();
        assert_eq!(loaded.table(), agent.table());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_train_and_store_persists_brain() {
        let mut config = Config::default();
        config.grid.size = 3;
        config.training.episodes = 100;
        config.training.report_interval = 50;
        config.play.brain_path = std::env::temp_dir().join(format!("pursuit_startup_{}.json", std::process::id()));
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let agent = Agent::train_and_store(&config, &mut rng).unwrap();
        let loaded = Agent::load(&config, &config.play.brain_path).unwrap();
        assert_eq!(loaded.table(), agent.table());

        std::fs::remove_file(&config.play.brain_path).unwrap();
    }

    #[test]
    fn test_train_and_store_reports_save_failure() {
        let mut config = Config::default();
        config.grid.size = 3;
        config.training.episodes = 10;
        config.training.report_interval = 10;
        config.play.brain_path = std::env::temp_dir()
            .join(format!("pursuit_missing_dir_{}", std::process::id()))
            .join("brain.json");
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        assert!(Agent::train_and_store(&config, &mut rng).is_err());
        assert!(!config.play.brain_path.exists());
    }
}
