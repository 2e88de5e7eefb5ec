//! Stone colours and the side to move.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content of a board cell, also used to denote the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Sign {
    #[default]
    None = 0,
    Cross = 1,
    Circle = 2,
}

impl Sign {
    /// The opposing side. `None` stays `None`.
    #[inline]
    pub fn invert(self) -> Sign {
        match self {
            Sign::None => Sign::None,
            Sign::Cross => Sign::Circle,
            Sign::Circle => Sign::Cross,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode the two-bit representation. Values above 2 map to `None`.
    #[inline]
    pub fn from_u8(value: u8) -> Sign {
        match value {
            1 => Sign::Cross,
            2 => Sign::Circle,
            _ => Sign::None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Sign::None => '_',
            Sign::Cross => 'X',
            Sign::Circle => 'O',
        }
    }

    pub fn from_char(c: char) -> Option<Sign> {
        match c {
            '_' | '.' => Some(Sign::None),
            'X' | 'x' => Some(Sign::Cross),
            'O' | 'o' => Some(Sign::Circle),
            _ => None,
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}
