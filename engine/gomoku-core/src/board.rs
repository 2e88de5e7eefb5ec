//! Board representation.
//!
//! The board is a dense row-major matrix of [`Sign`]. It knows nothing about
//! the rules: win detection and forbidden-move checks live with the external
//! pattern and solver components.

use crate::moves::{Move, MAX_COORDINATE};
use crate::sign::Sign;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building a board from external input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("invalid board dimensions {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("move {row},{col} is outside a {rows}x{cols} board")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("cell {row},{col} is already occupied")]
    Occupied { row: usize, col: usize },

    #[error("unexpected character '{0}' in board text")]
    InvalidCharacter(char),

    #[error("board rows have inconsistent lengths")]
    RaggedRows,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Sign>,
    move_count: usize,
}

impl Board {
    /// Create an empty board.
    ///
    /// # Panics
    /// If either dimension is zero or exceeds the packed move range.
    pub fn new(rows: usize, cols: usize) -> Self {
        assert!(
            Self::valid_dimensions(rows, cols),
            "invalid board dimensions {}x{}",
            rows,
            cols
        );
        Self {
            rows,
            cols,
            cells: vec![Sign::None; rows * cols],
            move_count: 0,
        }
    }

    /// Fallible constructor for dimensions coming from configuration.
    pub fn try_new(rows: usize, cols: usize) -> Result<Self, BoardError> {
        if !Self::valid_dimensions(rows, cols) {
            return Err(BoardError::InvalidDimensions { rows, cols });
        }
        Ok(Self::new(rows, cols))
    }

    fn valid_dimensions(rows: usize, cols: usize) -> bool {
        rows > 0 && cols > 0 && rows <= MAX_COORDINATE + 1 && cols <= MAX_COORDINATE + 1
    }

    /// Replay a move list onto an empty board.
    pub fn from_moves(rows: usize, cols: usize, moves: &[Move]) -> Result<Self, BoardError> {
        let mut board = Self::try_new(rows, cols)?;
        for mv in moves {
            board.try_put_move(*mv)?;
        }
        Ok(board)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Sign {
        self.cells[self.index(row, col)]
    }

    #[inline]
    pub fn is_empty_at(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == Sign::None
    }

    pub fn set(&mut self, row: usize, col: usize, sign: Sign) {
        let idx = self.index(row, col);
        let previous = std::mem::replace(&mut self.cells[idx], sign);
        match (previous, sign) {
            (Sign::None, Sign::None) => {}
            (Sign::None, _) => self.move_count += 1,
            (_, Sign::None) => self.move_count -= 1,
            _ => {}
        }
    }

    /// Place a stone. The target cell must be empty.
    pub fn put_move(&mut self, mv: Move) {
        debug_assert!(mv.sign != Sign::None);
        debug_assert!(
            self.is_empty_at(mv.row(), mv.col()),
            "cell {} is occupied",
            mv
        );
        self.set(mv.row(), mv.col(), mv.sign);
    }

    pub fn try_put_move(&mut self, mv: Move) -> Result<(), BoardError> {
        if mv.row() >= self.rows || mv.col() >= self.cols {
            return Err(BoardError::OutOfRange {
                row: mv.row(),
                col: mv.col(),
                rows: self.rows,
                cols: self.cols,
            });
        }
        if !self.is_empty_at(mv.row(), mv.col()) {
            return Err(BoardError::Occupied {
                row: mv.row(),
                col: mv.col(),
            });
        }
        self.put_move(mv);
        Ok(())
    }

    pub fn undo_move(&mut self, mv: Move) {
        debug_assert_eq!(self.get(mv.row(), mv.col()), mv.sign);
        self.set(mv.row(), mv.col(), Sign::None);
    }

    /// Number of stones on the board.
    #[inline]
    pub fn move_count(&self) -> usize {
        self.move_count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.move_count == self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.move_count == 0
    }

    pub fn cells(&self) -> &[Sign] {
        &self.cells
    }

    /// Coordinates of every empty cell in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Sign::None)
            .map(move |(i, _)| (i / cols, i % cols))
    }

    pub fn clear(&mut self) {
        self.cells.fill(Sign::None);
        self.move_count = 0;
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if col > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.get(row, col))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl FromStr for Board {
    type Err = BoardError;

    /// Parse the format produced by `Display`. Whitespace between cells is
    /// optional and blank lines are ignored.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut grid: Vec<Vec<Sign>> = Vec::new();
        for line in text.lines() {
            let row = line
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| Sign::from_char(c).ok_or(BoardError::InvalidCharacter(c)))
                .collect::<Result<Vec<_>, _>>()?;
            if !row.is_empty() {
                grid.push(row);
            }
        }

        let rows = grid.len();
        let cols = grid.first().map(|r| r.len()).unwrap_or(0);
        if grid.iter().any(|r| r.len() != cols) {
            return Err(BoardError::RaggedRows);
        }

        let mut board = Board::try_new(rows, cols)?;
        for (r, row) in grid.into_iter().enumerate() {
            for (c, sign) in row.into_iter().enumerate() {
                board.set(r, c, sign);
            }
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new(15, 15);
        assert_eq!(board.size(), 225);
        assert_eq!(board.move_count(), 0);
        assert_eq!(board.empty_cells().count(), 225);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert_eq!(
            Board::try_new(0, 15),
            Err(BoardError::InvalidDimensions { rows: 0, cols: 15 })
        );
        assert!(Board::try_new(200, 15).is_err());
    }

    #[test]
    fn test_put_and_undo_move() {
        let mut board = Board::new(15, 15);
        let mv = Move::new(7, 7, Sign::Cross);
        board.put_move(mv);
        assert_eq!(board.get(7, 7), Sign::Cross);
        assert_eq!(board.move_count(), 1);
        board.undo_move(mv);
        assert!(board.is_empty());
    }

    #[test]
    fn test_try_put_move_rejects_occupied_and_out_of_range() {
        let mut board = Board::new(5, 5);
        board.try_put_move(Move::new(1, 1, Sign::Cross)).unwrap();
        assert_eq!(
            board.try_put_move(Move::new(1, 1, Sign::Circle)),
            Err(BoardError::Occupied { row: 1, col: 1 })
        );
        assert!(matches!(
            board.try_put_move(Move::new(5, 0, Sign::Circle)),
            Err(BoardError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_text_roundtrip() {
        let text = "X _ O\n_ X _\n_ _ O\n";
        let board: Board = text.parse().unwrap();
        assert_eq!(board.rows(), 3);
        assert_eq!(board.cols(), 3);
        assert_eq!(board.move_count(), 4);
        assert_eq!(board.to_string(), text);
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        assert_eq!("X _\n_".parse::<Board>(), Err(BoardError::RaggedRows));
        assert_eq!(
            "X ?".parse::<Board>(),
            Err(BoardError::InvalidCharacter('?'))
        );
    }
}
