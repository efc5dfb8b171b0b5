//! Sparse Q-table keyed by chaser and runner positions

use std::collections::HashMap;

use crate::grid::{Action, Position};

/// Lookup key for a board configuration; whose turn it is does not matter
/// because rows are only ever read right before a chaser decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    pub chaser: Position,
    pub runner: Position
}

impl StateKey {
    pub const fn new(chaser: Position, runner: Position) -> Self {
        Self { chaser, runner }
    }
}

/// One Q-value per action, indexed by `Action::index`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ActionValues([f64; 5]);

impl ActionValues {
    pub fn from_array(values: [f64; 5]) -> Self {
        Self(values)
    }

    pub fn get(&self, action: Action) -> f64 {
        self.0[action.index()]
    }

    pub fn set(&mut self, action: Action, value: f64) {
        self.0[action.index()] = value;
    }

    pub fn as_array(&self) -> &[f64; 5] {
        &self.0
    }

    pub fn max_over(&self, actions: &[Action]) -> f64 {
        actions
            .iter()
            .map(|&action| self.get(action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    // every action sharing the top value, so callers can break ties randomly
    pub fn best_actions(&self, actions: &[Action]) -> Vec<Action> {
        let best = self.max_over(actions);
        actions
            .iter()
            .copied()
            .filter(|&action| self.get(action) == best)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    rows: HashMap<StateKey, ActionValues>
}

impl ValueTable {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &StateKey) -> Option<&ActionValues> {
        self.rows.get(key)
    }

    /// Returns the row for `key`, creating a zeroed one on first access.
    pub fn row_mut(&mut self, key: StateKey) -> &mut ActionValues {
        self.rows.entry(key).or_default()
    }

    pub fn value(&self, key: &StateKey, action: Action) -> f64 {
        self.rows.get(key).map_or(0.0, |row| row.get(action))
    }

    pub fn set(&mut self, key: StateKey, action: Action, value: f64) {
        self.row_mut(key).set(action, value);
    }

    pub fn insert_row(&mut self, key: StateKey, values: ActionValues) {
        self.rows.insert(key, values);
    }

    /// Best value among `actions` in `key`'s row; the row is created if missing.
    pub fn max_value(&mut self, key: StateKey, actions: &[Action]) -> f64 {
        self.row_mut(key).max_over(actions)
    }

    /// Moves Q(s,a) toward `target`: Q ← Q + α (target − Q). Returns the new value.
    pub fn update(&mut self, key: StateKey, action: Action, target: f64, learning_rate: f64) -> f64 {
        let row = self.row_mut(key);
        let old = row.get(action);
        let new = old + learning_rate * (target - old);
        row.set(action, new);
        new
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StateKey, &ActionValues)> {
        self.rows.iter()
    }

    /// Combines independently trained tables by averaging each value over
    /// the shards that contain its key.
    pub fn merge(shards: Vec<ValueTable>) -> ValueTable {
        let mut sums: HashMap<StateKey, ([f64; 5], usize)> = HashMap::new();

        for shard in shards {
            for (key, values) in shard.rows {
                let (sum, count) = sums.entry(key).or_insert(([0.0; 5], 0));
                for (total, value) in sum.iter_mut().zip(values.as_array()) {
                    *total += value;
                }
                *count += 1;
            }
        }

        let rows = sums
            .into_iter()
            .map(|(key, (sum, count))| (key, ActionValues(sum.map(|total| total / count as f64))))
            .collect();

        ValueTable { rows }
    }
}
