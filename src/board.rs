use serde::{Deserialize, Serialize};

use crate::orbit::OrbitPath;
use crate::types::{BOARD_SIZE, Cell, Color, NUM_CELLS, Outcome, Position};

const FULL_MASK: u16 = u16::MAX;
const DIRECTIONS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// The ten length-4 lines: four rows, four columns, two diagonals.
const LINES: [u16; 10] = [
    0x000F,
    0x00F0,
    0x0F00,
    0xF000,
    0x1111,
    0x2222,
    0x4444,
    0x8888,
    0x8421,
    0x1248,
];

/// Orbito board state represented by two 16-bit bitboards (bit = row * 4 + col).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<Cell>>", try_from = "Vec<Vec<Cell>>")]
pub struct Board {
    black: u16,
    white: u16,
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self { black: 0, white: 0 }
    }

    pub(crate) fn from_bitboards(black: u16, white: u16) -> Self {
        debug_assert_eq!(black & white, 0, "a square cannot hold two marbles");
        Self { black, white }
    }

    pub fn cell(&self, pos: Position) -> Cell {
        let square = bit(pos);
        if (self.black & square) != 0 {
            Cell::Black
        } else if (self.white & square) != 0 {
            Cell::White
        } else {
            Cell::Empty
        }
    }

    pub fn is_empty(&self, pos: Position) -> bool {
        pos.in_bounds(BOARD_SIZE) && ((self.black | self.white) & bit(pos)) == 0
    }

    /// Overwrites one square. Out-of-range positions are ignored.
    pub fn set(&mut self, pos: Position, cell: Cell) {
        let square = bit(pos);
        self.black &= !square;
        self.white &= !square;
        match cell {
            Cell::Black => self.black |= square,
            Cell::White => self.white |= square,
            Cell::Empty => {}
        }
    }

    /// Places a marble on an empty square. Returns `false` and leaves the
    /// board unchanged when the square is occupied or out of range.
    pub fn place(&mut self, pos: Position, color: Color) -> bool {
        if !self.is_empty(pos) {
            return false;
        }
        self.set(pos, color.into());
        true
    }

    /// Relocates the marble at `from` to the empty square `to`.
    pub fn move_marble(&mut self, from: Position, to: Position) -> bool {
        let cell = self.cell(from);
        if cell == Cell::Empty || !self.is_empty(to) {
            return false;
        }
        self.set(from, Cell::Empty);
        self.set(to, cell);
        true
    }

    /// Orthogonal neighbours of `pos` that are on the board and empty,
    /// in up, down, left, right order.
    pub fn valid_moves(&self, pos: Position) -> Vec<Position> {
        let row = pos.row as i32;
        let col = pos.col as i32;

        DIRECTIONS
            .iter()
            .filter_map(|(dr, dc)| {
                let (r, c) = (row + dr, col + dc);
                if !in_bounds(r, c) {
                    return None;
                }
                let target = Position::new(r as u8, c as u8);
                self.is_empty(target).then_some(target)
            })
            .collect()
    }

    /// Applies every orbit edge at once. The result is computed entirely
    /// from `self`, so no marble is overwritten before it is read. Squares
    /// outside every orbit keep their content.
    pub fn rotate(&self, paths: &[OrbitPath]) -> Self {
        let mut sources = 0u16;
        for path in paths {
            sources |= bit(path.position);
        }

        let mut next = Self {
            black: self.black & !sources,
            white: self.white & !sources,
        };
        for path in paths {
            let cell = self.cell(path.position);
            if cell != Cell::Empty {
                next.set(path.next_position, cell);
            }
        }
        next
    }

    /// Returns `(black_count, white_count)`.
    pub fn count(&self) -> (u8, u8) {
        (self.black.count_ones() as u8, self.white.count_ones() as u8)
    }

    pub fn is_full(&self) -> bool {
        (self.black | self.white) == FULL_MASK
    }

    /// Scores the board: a line of four for one color wins; lines for both
    /// colors, or a full board without any line, is a draw.
    pub fn outcome(&self) -> Outcome {
        let black_line = LINES.iter().any(|&line| self.black & line == line);
        let white_line = LINES.iter().any(|&line| self.white & line == line);

        match (black_line, white_line) {
            (true, true) => Outcome::Draw,
            (true, false) => Outcome::Winner(Color::Black),
            (false, true) => Outcome::Winner(Color::White),
            (false, false) if self.is_full() => Outcome::Draw,
            (false, false) => Outcome::Undecided,
        }
    }

    /// Converts board to `[Cell; 16]` in row-major order.
    pub fn to_array(&self) -> [Cell; NUM_CELLS] {
        let mut cells = [Cell::Empty; NUM_CELLS];
        for (idx, cell) in cells.iter_mut().enumerate() {
            *cell = self.cell(Position::from_index(idx));
        }
        cells
    }

    /// Stable byte encoding used for state digests.
    pub fn to_bytes(&self) -> [u8; 4] {
        let [b0, b1] = self.black.to_le_bytes();
        let [w0, w1] = self.white.to_le_bytes();
        [b0, b1, w0, w1]
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Board> for Vec<Vec<Cell>> {
    fn from(board: Board) -> Self {
        board
            .to_array()
            .chunks(BOARD_SIZE)
            .map(|row| row.to_vec())
            .collect()
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Board {
    type Error = String;

    fn try_from(rows: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        if rows.len() != BOARD_SIZE || rows.iter().any(|row| row.len() != BOARD_SIZE) {
            return Err(format!("board must be {BOARD_SIZE}x{BOARD_SIZE}"));
        }

        let mut board = Self::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                board.set(Position::new(r as u8, c as u8), cell);
            }
        }
        Ok(board)
    }
}

fn bit(pos: Position) -> u16 {
    if pos.in_bounds(BOARD_SIZE) {
        1u16 << pos.index()
    } else {
        0
    }
}

fn in_bounds(row: i32, col: i32) -> bool {
    (0..BOARD_SIZE as i32).contains(&row) && (0..BOARD_SIZE as i32).contains(&col)
}
