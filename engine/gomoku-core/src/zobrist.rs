//! Zobrist hashing for board positions.
//!
//! Keys are drawn from a `ChaCha20Rng` with a fixed seed so hashes are
//! reproducible across runs and threads.

use crate::board::Board;
use crate::sign::Sign;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
pub struct ZobristHashing {
    rows: usize,
    cols: usize,
    /// Two keys per cell: cross, circle.
    keys: Vec<[u64; 2]>,
    circle_to_move: u64,
}

impl ZobristHashing {
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(ZOBRIST_SEED);
        let keys = (0..rows * cols).map(|_| [rng.gen(), rng.gen()]).collect();
        Self {
            rows,
            cols,
            keys,
            circle_to_move: rng.gen(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Full hash of a position including the side to move.
    pub fn hash(&self, board: &Board, sign_to_move: Sign) -> u64 {
        debug_assert!(board.rows() == self.rows && board.cols() == self.cols);
        let mut h = 0u64;
        for (idx, sign) in board.cells().iter().enumerate() {
            match sign {
                Sign::Cross => h ^= self.keys[idx][0],
                Sign::Circle => h ^= self.keys[idx][1],
                Sign::None => {}
            }
        }
        if sign_to_move == Sign::Circle {
            h ^= self.circle_to_move;
        }
        h
    }
}
