use serde::{Deserialize, Serialize};

/// Side length of the Orbito board.
pub const BOARD_SIZE: usize = 4;
pub const NUM_CELLS: usize = BOARD_SIZE * BOARD_SIZE;

/// A marble color, doubling as the player identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Black => "BLACK",
            Self::White => "WHITE",
        })
    }
}

/// Content of a single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cell {
    #[default]
    Empty,
    Black,
    White,
}

impl From<Color> for Cell {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => Self::Black,
            Color::White => Self::White,
        }
    }
}

impl Cell {
    pub fn color(self) -> Option<Color> {
        match self {
            Self::Empty => None,
            Self::Black => Some(Color::Black),
            Self::White => Some(Color::White),
        }
    }
}

/// A board coordinate. "No selection" is expressed as `Option<Position>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Checked constructor for untrusted coordinates.
    pub fn try_new(row: u8, col: u8) -> Option<Self> {
        let pos = Self { row, col };
        pos.in_bounds(BOARD_SIZE).then_some(pos)
    }

    pub fn in_bounds(&self, size: usize) -> bool {
        (self.row as usize) < size && (self.col as usize) < size
    }

    /// Row-major square index on the 4x4 board.
    pub fn index(&self) -> usize {
        self.row as usize * BOARD_SIZE + self.col as usize
    }

    pub fn from_index(idx: usize) -> Self {
        Self {
            row: (idx / BOARD_SIZE) as u8,
            col: (idx % BOARD_SIZE) as u8,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// Sub-state of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    MoveOpponent,
    PlacePiece,
    MustRotate,
}

/// Result of the game so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    #[default]
    Undecided,
    Winner(Color),
    Draw,
}

impl Outcome {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Undecided)
    }
}

/// Cumulative results of one color within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorStats {
    pub wins: u32,
    pub draws: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stats {
    pub black: ColorStats,
    pub white: ColorStats,
}

impl Stats {
    /// Counts a finished game. Draws are credited to both colors.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Winner(Color::Black) => self.black.wins += 1,
            Outcome::Winner(Color::White) => self.white.wins += 1,
            Outcome::Draw => {
                self.black.draws += 1;
                self.white.draws += 1;
            }
            Outcome::Undecided => {}
        }
    }
}

/// Public game state returned from WASM APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub board: Vec<Vec<Cell>>,
    pub current_player: Color,
    pub turn_phase: TurnPhase,
    pub selected_piece: Option<Position>,
    /// Contract:
    /// - Empty when nothing is selected.
    /// - Otherwise the empty orthogonal neighbours of `selected_piece`.
    pub valid_moves: Vec<Position>,
    pub winner: Outcome,
    pub config_name: String,
    pub sequence: u64,
    pub stats: Stats,
    pub starting_player: Color,
    pub is_rotating: bool,
    pub status: String,
}
