//! Core game primitives for the Gomoku search engine
//!
//! This crate provides the types the tree search is built on:
//! - `Sign`: stone colour / side to move
//! - `Move`: a stone placement, packable into a `u16`
//! - `Board`: row-major matrix of signs
//! - `ZobristHashing`: deterministic position hashing
//! - `Symmetry`: the dihedral transforms of a board

pub mod board;
pub mod moves;
pub mod sign;
pub mod symmetry;
pub mod zobrist;

pub use board::{Board, BoardError};
pub use moves::Move;
pub use sign::Sign;
pub use symmetry::Symmetry;
pub use zobrist::ZobristHashing;
