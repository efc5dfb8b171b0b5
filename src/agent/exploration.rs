use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Serialize, Deserialize};

use crate::agent::qtable::{StateKey, ValueTable};
use crate::grid::{Action, Grid, Position};

/// ε-greedy choice for the chaser in `key`.
///
/// Exploitation breaks ties uniformly at random so the chaser has no built-in
/// directional bias. Looking up an unseen key inserts a zeroed row, even when
/// `epsilon` is 0.
pub fn select_action<R: Rng>(
    table: &mut ValueTable,
    grid: &Grid,
    key: StateKey,
    epsilon: f64,
    rng: &mut R,
) -> Action {
    let valid = grid.valid_moves(key.chaser);

    if epsilon > 0.0 && rng.random::<f64>() < epsilon {
        return *valid.choose(rng).unwrap_or(&Action::Stay);
    }

    let best = table.row_mut(key).best_actions(&valid);
    *best.choose(rng).unwrap_or(&Action::Stay)
}

/// Uniformly random legal move, used for the training opponent.
pub fn random_action<R: Rng>(grid: &Grid, position: Position, rng: &mut R) -> Action {
    *grid.valid_moves(position).choose(rng).unwrap_or(&Action::Stay)
}

/// Multiplicative per-episode decay of the exploration rate, clamped at a floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpsilonSchedule {
    pub initial: f64,
    pub floor: f64,
    pub decay: f64
}

impl EpsilonSchedule {
    pub fn new(initial: f64, floor: f64, decay: f64) -> Self {
        Self { initial, floor, decay }
    }

    pub fn next(&self, epsilon: f64) -> f64 {
        (epsilon * self.decay).max(self.floor)
    }

    // closed form of applying `next` k times from `initial`
    pub fn after(&self, episodes: u64) -> f64 {
        let exponent = i32::try_from(episodes).unwrap_or(i32::MAX);
        (self.initial * self.decay.powi(exponent)).max(self.floor)
    }
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self::new(1.0, 0.01, 0.999995)
    }
}
