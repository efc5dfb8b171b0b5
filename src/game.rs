use crate::grid::{Action, Grid, Position};
use crate::agent::qtable::StateKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    Chaser,
    Runner
}

impl Actor {
    pub fn other(self) -> Self {
        match self {
            Actor::Chaser => Actor::Runner,
            Actor::Runner => Actor::Chaser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    InProgress,
    ChaserWon,
    RunnerWon
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState {
    pub chaser: Position,
    pub runner: Position,
    pub turn: Actor
}

impl GameState {
    pub fn key(&self) -> StateKey {
        StateKey::new(self.chaser, self.runner)
    }

    pub fn position_of(&self, actor: Actor) -> Position {
        match actor {
            Actor::Chaser => self.chaser,
            Actor::Runner => self.runner,
        }
    }
}

/// Rules of the pursuit game on a fixed grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Game {
    grid: Grid
}

impl Game {
    pub fn new(grid: Grid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &Grid {&self.grid}

    pub fn initial_state(&self) -> GameState {
        GameState {
            chaser: self.grid.chaser_start(),
            runner: self.grid.runner_start(),
            turn: Actor::Runner
        }
    }

    // an illegal action leaves the actor in place but still passes the turn
    pub fn apply_move(&self, state: &GameState, actor: Actor, action: Action) -> GameState {
        let mut next = *state;
        let current = state.position_of(actor);

        if self.grid.is_valid_move(current, action) {
            let moved = current.offset(action.delta());
            match actor {
                Actor::Chaser => next.chaser = moved,
                Actor::Runner => next.runner = moved,
            }
        }
        next.turn = actor.other();

        next
    }

    // the catch check must come first: a runner stepping onto a chaser that
    // guards the exit is caught, not escaped
    pub fn outcome(&self, state: &GameState) -> Outcome {
        if state.chaser == state.runner {
            Outcome::ChaserWon
        } else if state.runner == self.grid.exit() {
            Outcome::RunnerWon
        } else {
            Outcome::InProgress
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let game = Game::default();
        let state = game.initial_state();

        assert_eq!(state.runner, Position::new(0, 0));
        assert_eq!(state.chaser, Position::new(6, 6));
        assert_eq!(state.turn, Actor::Runner);
        assert_eq!(game.outcome(&state), Outcome::InProgress);
    }

    #[test]
    fn test_apply_move_flips_turn_and_moves() {
        let game = Game::default();
        let state = game.initial_state();

        let next = game.apply_move(&state, Actor::Runner, Action::Right);
        assert_eq!(next.runner, Position::new(0, 1));
        assert_eq!(next.chaser, state.chaser);
        assert_eq!(next.turn, Actor::Chaser);

        // input is untouched
        assert_eq!(state.runner, Position::new(0, 0));
        assert_eq!(state.turn, Actor::Runner);
    }

    #[test]
    fn test_invalid_move_is_noop_but_turn_advances() {
        let game = Game::default();
        let state = game.initial_state();

        let next = game.apply_move(&state, Actor::Runner, Action::Up);
        assert_eq!(next.runner, Position::new(0, 0));
        assert_eq!(next.turn, Actor::Chaser);

        let next = game.apply_move(&next, Actor::Chaser, Action::Down);
        assert_eq!(next.chaser, Position::new(6, 6));
        assert_eq!(next.turn, Actor::Runner);
    }

    #[test]
    fn test_catch_on_exit_goes_to_chaser() {
        let game = Game::default();
        let state = GameState {
            chaser: Position::new(6, 6),
            runner: Position::new(6, 6),
            turn: Actor::Chaser
        };
        assert_eq!(game.outcome(&state), Outcome::ChaserWon);
    }

    #[test]
    fn test_runner_reaches_exit() {
        let game = Game::default();
        let state = GameState {
            chaser: Position::new(3, 3),
            runner: Position::new(6, 6),
            turn: Actor::Chaser
        };
        assert_eq!(game.outcome(&state), Outcome::RunnerWon);
        assert!(Outcome::RunnerWon.is_terminal());
        assert!(!Outcome::InProgress.is_terminal());
    }

    // walk the runner down then right; the chaser only ever plays STAY
    fn run_stay_chaser(game: &Game, mut state: GameState) -> Outcome {
        loop {
            let action = if state.runner.row < 6 { Action::Down } else { Action::Right };
            state = game.apply_move(&state, Actor::Runner, action);
            let outcome = game.outcome(&state);
            if outcome.is_terminal() {
                return outcome;
            }
            state = game.apply_move(&state, Actor::Chaser, Action::Stay);
            let outcome = game.outcome(&state);
            if outcome.is_terminal() {
                return outcome;
            }
        }
    }

    #[test]
    fn test_runner_escapes_idle_chaser_off_exit() {
        let game = Game::default();
        let mut state = game.initial_state();
        state.chaser = Position::new(0, 6);

        assert_eq!(run_stay_chaser(&game, state), Outcome::RunnerWon);
    }

    #[test]
    fn test_chaser_guarding_exit_cannot_lose() {
        let game = Game::default();
        let state = game.initial_state();

        assert_eq!(run_stay_chaser(&game, state), Outcome::ChaserWon);
    }
}
