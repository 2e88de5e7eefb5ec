//! Search graph node representation.
//!
//! Each node represents one position (board plus side to move). Nodes live in
//! the [`NodeCache`](crate::node_cache::NodeCache) arena and are shared between
//! every path that reaches the same position.

use crate::edge::Edge;
use crate::score::Score;
use crate::value::Value;
use gomoku_core::Sign;
use std::cmp::Ordering;
use std::fmt;

/// Handle to a node in the cache arena.
///
/// The generation changes every time the slot is recycled, so a handle kept
/// past a cleanup is detected instead of silently aliasing another position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    pub fn slot(self) -> u32 {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    edges: Vec<Edge>,
    value: Value,
    score: Score,
    visits: u32,
    virtual_loss: u32,
    depth: u16,
    sign_to_move: Sign,
    is_root: bool,
    must_defend: bool,
}

impl Node {
    /// Reset every field while keeping the edge storage allocated.
    pub(crate) fn reset(&mut self, depth: usize, sign_to_move: Sign) {
        self.edges.clear();
        self.value = Value::default();
        self.score = Score::default();
        self.visits = 0;
        self.virtual_loss = 0;
        self.depth = depth as u16;
        self.sign_to_move = sign_to_move;
        self.is_root = false;
        self.must_defend = false;
    }

    /// Allocate exactly `count` edges. May be called once per node lifetime.
    pub fn create_edges(&mut self, count: usize) {
        assert!(self.edges.is_empty(), "edges were already created");
        self.edges.resize_with(count, Edge::default);
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn edges_mut(&mut self) -> &mut [Edge] {
        &mut self.edges
    }

    #[inline]
    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    #[inline]
    pub fn edge_mut(&mut self, index: usize) -> &mut Edge {
        &mut self.edges[index]
    }

    #[inline]
    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn edge_capacity(&self) -> usize {
        self.edges.capacity()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty()
    }

    /// Every edge has been linked to a child node.
    pub fn is_fully_expanded(&self) -> bool {
        !self.edges.is_empty() && self.edges.iter().all(|e| !e.is_leaf())
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn expectation(&self, style_factor: f32) -> f32 {
        self.value.expectation(style_factor)
    }

    #[inline]
    pub fn visits(&self) -> u32 {
        self.visits
    }

    #[inline]
    pub fn score(&self) -> Score {
        self.score
    }

    #[inline]
    pub fn is_proven(&self) -> bool {
        self.score.is_proven()
    }

    #[inline]
    pub fn virtual_loss(&self) -> u32 {
        self.virtual_loss
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    #[inline]
    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn mark_as_root(&mut self) {
        self.is_root = true;
    }

    pub fn unmark_as_root(&mut self) {
        self.is_root = false;
    }

    #[inline]
    pub fn must_defend(&self) -> bool {
        self.must_defend
    }

    pub fn set_must_defend(&mut self, flag: bool) {
        self.must_defend = flag;
    }

    pub fn update_value(&mut self, eval: Value) {
        self.visits += 1;
        let step = 1.0 / self.visits as f32;
        self.value += (eval - self.value) * step;
    }

    pub fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    /// Recompute the node score as the best of its edge scores.
    pub fn update_score_from_edges(&mut self) {
        debug_assert!(!self.edges.is_empty());
        self.score = self
            .edges
            .iter()
            .map(|e| e.score())
            .max()
            .unwrap_or_default();
    }

    pub fn increase_virtual_loss(&mut self) {
        self.virtual_loss += 1;
    }

    pub fn decrease_virtual_loss(&mut self) {
        assert!(self.virtual_loss > 0, "virtual loss underflow on node");
        self.virtual_loss -= 1;
    }

    /// Order edges best-first: proven score, then visits, expectation and
    /// prior.
    pub fn sort_edges(&mut self, style_factor: f32) {
        self.edges.sort_by(|lhs, rhs| compare_edges(rhs, lhs, style_factor));
    }

    pub fn total_edge_visits(&self) -> u32 {
        self.edges.iter().map(|e| e.visits()).sum()
    }
}

/// Ranking used for sorting and reporting. `Greater` means `lhs` is better.
pub fn compare_edges(lhs: &Edge, rhs: &Edge, style_factor: f32) -> Ordering {
    if lhs.is_proven() || rhs.is_proven() {
        let by_score = lhs.score().cmp(&rhs.score());
        if by_score != Ordering::Equal {
            return by_score;
        }
    }
    let key = |e: &Edge| {
        e.visits() as f32 + e.expectation(style_factor) + 0.001 * e.policy_prior()
    };
    key(lhs).partial_cmp(&key(rhs)).unwrap_or(Ordering::Equal)
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : Q={} : N={} : depth={} : edges={}",
            self.sign_to_move,
            self.score,
            self.value,
            self.visits,
            self.depth,
            self.edges.len()
        )?;
        if self.virtual_loss > 0 {
            write!(f, " : VL={}", self.virtual_loss)?;
        }
        Ok(())
    }
}
