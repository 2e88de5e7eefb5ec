//! Stone placements.
//!
//! A move packs into 16 bits as `sign | row << 2 | col << 9`, which limits
//! boards to 127 rows and columns.

use crate::sign::Sign;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest row or column index representable in a packed move.
pub const MAX_COORDINATE: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Move {
    pub row: u8,
    pub col: u8,
    pub sign: Sign,
}

impl Move {
    #[inline]
    pub fn new(row: usize, col: usize, sign: Sign) -> Self {
        debug_assert!(row <= MAX_COORDINATE && col <= MAX_COORDINATE);
        Self {
            row: row as u8,
            col: col as u8,
            sign,
        }
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.row as usize
    }

    #[inline]
    pub fn col(&self) -> usize {
        self.col as usize
    }

    #[inline]
    pub fn to_short(self) -> u16 {
        self.sign.to_u8() as u16 | (self.row as u16) << 2 | (self.col as u16) << 9
    }

    #[inline]
    pub fn from_short(raw: u16) -> Self {
        Self {
            row: ((raw >> 2) & 127) as u8,
            col: ((raw >> 9) & 127) as u8,
            sign: Sign::from_u8((raw & 3) as u8),
        }
    }

    /// Same location, different sign.
    #[inline]
    pub fn with_sign(self, sign: Sign) -> Self {
        Self { sign, ..self }
    }

    /// Column letter followed by a 1-based row, e.g. `h8`.
    pub fn text(&self) -> String {
        let letter = (b'a' + self.col) as char;
        format!("{}{}", letter, self.row as usize + 1)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sign, self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let mv = Move::new(3, 5, Sign::Circle);
        assert_eq!(mv.to_short(), 2 | 3 << 2 | 5 << 9);
        assert_eq!(Move::from_short(mv.to_short()), mv);
    }

    #[test]
    fn test_pack_extremes() {
        let mv = Move::new(MAX_COORDINATE, MAX_COORDINATE, Sign::Cross);
        let unpacked = Move::from_short(mv.to_short());
        assert_eq!(unpacked.row(), MAX_COORDINATE);
        assert_eq!(unpacked.col(), MAX_COORDINATE);
        assert_eq!(unpacked.sign, Sign::Cross);
    }

    #[test]
    fn test_text() {
        assert_eq!(Move::new(7, 7, Sign::Cross).text(), "h8");
        assert_eq!(Move::new(0, 0, Sign::Circle).to_string(), "O:a1");
    }
}
