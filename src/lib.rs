pub mod error;
pub mod config;

pub mod grid;
pub mod game;
pub mod reward;

pub use grid::{Action, Grid, Position};
pub use game::{Actor, Game, GameState, Outcome};
pub use reward::RewardScheme;

pub mod agent;

pub use agent::{Agent, EvaluationStats, TrainingProgress, TrainingSummary};
pub use agent::qtable::{ActionValues, StateKey, ValueTable};
pub use agent::exploration::{select_action, EpsilonSchedule};

pub mod session;

pub use session::Session;
pub use config::Config;
pub use error::{Error, Result};
