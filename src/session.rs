use rand::Rng;

use crate::agent::Agent;
use crate::game::{Actor, GameState, Outcome};
use crate::grid::Action;

/// One interactive match: a human runner against the greedy chaser.
///
/// Moves are refused once the game is over or when it is not that side's
/// turn. `reset` starts a new match with the same learned table.
pub struct Session {
    agent: Agent,
    state: GameState,
    outcome: Outcome
}

impl Session {
    pub fn new(agent: Agent) -> Self {
        let state = agent.game().initial_state();
        Self {
            agent,
            state,
            outcome: Outcome::InProgress
        }
    }

    pub fn state(&self) -> &GameState {&self.state}
    pub fn outcome(&self) -> Outcome {self.outcome}
    pub fn agent(&self) -> &Agent {&self.agent}

    pub fn runner_to_move(&self) -> bool {
        !self.outcome.is_terminal() && self.state.turn == Actor::Runner
    }

    pub fn chaser_to_move(&self) -> bool {
        !self.outcome.is_terminal() && self.state.turn == Actor::Chaser
    }

    // illegal directions are accepted and simply waste the runner's turn
    pub fn runner_move(&mut self, action: Action) -> bool {
        if !self.runner_to_move() {
            return false;
        }
        self.state = self.agent.game().apply_move(&self.state, Actor::Runner, action);
        self.outcome = self.agent.game().outcome(&self.state);
        true
    }

    pub fn chaser_move<R: Rng>(&mut self, rng: &mut R) -> Option<Action> {
        if !self.chaser_to_move() {
            return None;
        }
        let action = self.agent.get_action(&self.state, rng);
        self.state = self.agent.game().apply_move(&self.state, Actor::Chaser, action);
        self.outcome = self.agent.game().outcome(&self.state);
        Some(action)
    }

    pub fn reset(&mut self) {
        self.state = self.agent.game().initial_state();
        self.outcome = Outcome::InProgress;
    }
}
