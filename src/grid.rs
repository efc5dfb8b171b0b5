use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub row: i32,
    pub col: i32
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, (dr, dc): (i32, i32)) -> Self {
        Self::new(self.row + dr, self.col + dc)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Stay
}

impl Action {
    pub const ALL: [Action; 5] = [Action::Up, Action::Down, Action::Left, Action::Right, Action::Stay];

    // (row, col) displacement
    pub fn delta(self) -> (i32, i32) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
            Action::Stay => (0, 0),
        }
    }

    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
            Action::Stay => 4,
        }
    }
}

/// Square board with a single exit in the bottom-right corner.
///
/// The runner starts in the top-left corner and the chaser starts on the exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    size: i32,
    exit: Position
}

impl Grid {
    pub fn new(size: i32) -> Result<Self> {
        if size < 2 {
            return Err(Error::invalid_config(format!("grid size must be at least 2, got {}", size)));
        }
        Ok(Self {
            size,
            exit: Position::new(size - 1, size - 1)
        })
    }

    pub fn size(&self) -> i32 {self.size}
    pub fn exit(&self) -> Position {self.exit}
    pub fn runner_start(&self) -> Position {Position::new(0, 0)}
    pub fn chaser_start(&self) -> Position {self.exit}

    pub fn is_valid_position(&self, row: i32, col: i32) -> bool {
        0 <= row && row < self.size && 0 <= col && col < self.size
    }

    pub fn contains(&self, position: Position) -> bool {
        self.is_valid_position(position.row, position.col)
    }

    // STAY is always present since its displacement is zero
    pub fn valid_moves(&self, position: Position) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|&action| self.is_valid_move(position, action))
            .collect()
    }

    pub fn is_valid_move(&self, position: Position, action: Action) -> bool {
        self.contains(position.offset(action.delta()))
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.size).flat_map(move |row| (0..self.size).map(move |col| Position::new(row, col)))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            size: 7,
            exit: Position::new(6, 6)
        }
    }
}
