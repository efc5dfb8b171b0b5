//! Runtime configuration, read from a TOML file.
//!
//! Every field has a default, so a partial file (or none at all) is fine:
//!
//! ```toml
//! [grid]
//! size = 7
//!
//! [training]
//! episodes = 500000
//! seed = 42
//! ```

use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::agent::exploration::EpsilonSchedule;
use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::reward::RewardScheme;

pub const DEFAULT_CONFIG_PATH: &str = "pursuit.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub rewards: RewardScheme,
    pub training: TrainingConfig,
    pub play: PlayConfig
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub size: i32
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { size: 7 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub initial_epsilon: f64,
    pub min_epsilon: f64,
    pub epsilon_decay: f64,
    pub episodes: u64,
    pub report_interval: u64,
    pub seed: Option<u64>,
    pub shards: usize
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            initial_epsilon: 1.0,
            min_epsilon: 0.01,
            epsilon_decay: 0.999995,
            episodes: 1_000_000,
            report_interval: 100_000,
            seed: None,
            shards: 1
        }
    }
}

impl TrainingConfig {
    pub fn epsilon_schedule(&self) -> EpsilonSchedule {
        EpsilonSchedule::new(self.initial_epsilon, self.min_epsilon, self.epsilon_decay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayConfig {
    pub think_delay: f32, // seconds
    pub brain_path: PathBuf
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self {
            think_delay: 0.3,
            brain_path: PathBuf::from("ai_brain_7x7_guardian.json")
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(Error::Io {
                operation: format!("read {}", path.display()),
                source,
            }),
        }
    }

    pub fn grid(&self) -> Result<Grid> {
        Grid::new(self.grid.size)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.training;

        if self.grid.size < 2 {
            return Err(Error::invalid_config(format!("grid.size must be at least 2, got {}", self.grid.size)));
        }
        if !(t.learning_rate > 0.0 && t.learning_rate <= 1.0) {
            return Err(Error::invalid_config(format!("training.learning_rate must be in (0, 1], got {}", t.learning_rate)));
        }
        if !(0.0..=1.0).contains(&t.discount_factor) {
            return Err(Error::invalid_config(format!("training.discount_factor must be in [0, 1], got {}", t.discount_factor)));
        }
        if !(0.0 <= t.min_epsilon && t.min_epsilon <= t.initial_epsilon && t.initial_epsilon <= 1.0) {
            return Err(Error::invalid_config(format!(
                "need 0 <= training.min_epsilon <= training.initial_epsilon <= 1, got {} and {}",
                t.min_epsilon, t.initial_epsilon
            )));
        }
        if !(t.epsilon_decay > 0.0 && t.epsilon_decay <= 1.0) {
            return Err(Error::invalid_config(format!("training.epsilon_decay must be in (0, 1], got {}", t.epsilon_decay)));
        }
        if t.episodes == 0 {
            return Err(Error::invalid_config("training.episodes must be positive"));
        }
        if t.report_interval == 0 {
            return Err(Error::invalid_config("training.report_interval must be positive"));
        }
        if t.shards == 0 {
            return Err(Error::invalid_config("training.shards must be at least 1"));
        }
        if !self.play.think_delay.is_finite() || self.play.think_delay < 0.0 {
            return Err(Error::invalid_config(format!("play.think_delay must be a non-negative number, got {}", self.play.think_delay)));
        }

        Ok(())
    }
}
