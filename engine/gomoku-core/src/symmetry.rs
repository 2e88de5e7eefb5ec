//! Dihedral symmetries of the board.
//!
//! Square boards have all eight transforms; rectangular boards only the four
//! that keep the dimensions.

use crate::board::Board;
use crate::moves::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symmetry {
    Identity,
    FlipVertical,
    FlipHorizontal,
    Rotate180,
    FlipDiagonal,
    FlipAntidiagonal,
    Rotate90,
    Rotate270,
}

impl Symmetry {
    pub const ALL: [Symmetry; 8] = [
        Symmetry::Identity,
        Symmetry::FlipVertical,
        Symmetry::FlipHorizontal,
        Symmetry::Rotate180,
        Symmetry::FlipDiagonal,
        Symmetry::FlipAntidiagonal,
        Symmetry::Rotate90,
        Symmetry::Rotate270,
    ];

    /// Transforms applicable to a board of the given shape.
    pub fn available(rows: usize, cols: usize) -> &'static [Symmetry] {
        if rows == cols {
            &Self::ALL
        } else {
            &Self::ALL[..4]
        }
    }

    fn swaps_axes(self) -> bool {
        matches!(
            self,
            Symmetry::FlipDiagonal
                | Symmetry::FlipAntidiagonal
                | Symmetry::Rotate90
                | Symmetry::Rotate270
        )
    }

    /// Map a coordinate through the transform.
    pub fn apply(self, row: usize, col: usize, rows: usize, cols: usize) -> (usize, usize) {
        debug_assert!(!self.swaps_axes() || rows == cols);
        let last_r = rows - 1;
        let last_c = cols - 1;
        match self {
            Symmetry::Identity => (row, col),
            Symmetry::FlipVertical => (last_r - row, col),
            Symmetry::FlipHorizontal => (row, last_c - col),
            Symmetry::Rotate180 => (last_r - row, last_c - col),
            Symmetry::FlipDiagonal => (col, row),
            Symmetry::FlipAntidiagonal => (last_c - col, last_r - row),
            Symmetry::Rotate90 => (col, last_r - row),
            Symmetry::Rotate270 => (last_c - col, row),
        }
    }

    pub fn apply_move(self, mv: Move, rows: usize, cols: usize) -> Move {
        let (r, c) = self.apply(mv.row(), mv.col(), rows, cols);
        Move::new(r, c, mv.sign)
    }

    pub fn apply_board(self, board: &Board) -> Board {
        let (rows, cols) = (board.rows(), board.cols());
        let mut result = Board::new(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                let (r, c) = self.apply(row, col, rows, cols);
                result.set(r, c, board.get(row, col));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::Sign;

    #[test]
    fn test_available_depends_on_shape() {
        assert_eq!(Symmetry::available(15, 15).len(), 8);
        assert_eq!(Symmetry::available(15, 20).len(), 4);
    }

    #[test]
    fn test_transforms_are_permutations() {
        for sym in Symmetry::ALL {
            let mut seen = vec![false; 25];
            for r in 0..5 {
                for c in 0..5 {
                    let (nr, nc) = sym.apply(r, c, 5, 5);
                    assert!(!seen[nr * 5 + nc], "{:?} maps two cells together", sym);
                    seen[nr * 5 + nc] = true;
                }
            }
        }
    }

    #[test]
    fn test_apply_board_moves_stones() {
        let mut board = Board::new(5, 5);
        board.put_move(Move::new(0, 1, Sign::Cross));
        let rotated = Symmetry::Rotate180.apply_board(&board);
        assert_eq!(rotated.get(4, 3), Sign::Cross);
        assert_eq!(rotated.move_count(), 1);
    }

    #[test]
    fn test_center_is_fixed_point() {
        for sym in Symmetry::ALL {
            assert_eq!(sym.apply(7, 7, 15, 15), (7, 7));
        }
    }
}
