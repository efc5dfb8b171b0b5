use serde::{Serialize, Deserialize};
use crate::game::{GameState, Outcome};

/// Terminal-outcome reward with a flat per-move cost.
///
/// There is deliberately no distance term: a chaser rewarded for closing in
/// on the runner can be lured off the exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardScheme {
    pub catch: f64,
    pub escape: f64,
    pub step: f64
}

impl Default for RewardScheme {
    fn default() -> Self {
        Self {
            catch: 200.0,
            escape: -200.0,
            step: -1.0
        }
    }
}

impl RewardScheme {
    pub fn reward(&self, _previous: &GameState, _next: &GameState, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::ChaserWon => self.catch,
            Outcome::RunnerWon => self.escape,
            Outcome::InProgress => self.step,
        }
    }
}
