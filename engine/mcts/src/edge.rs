//! Edges of the search graph.
//!
//! An edge is one move out of a node. It carries its own statistics because
//! the child it points to may be shared with other parents through
//! transpositions.

use crate::node::NodeId;
use crate::score::Score;
use crate::value::Value;
use gomoku_core::Move;
use std::fmt;

/// Upper bound for the in-flight traversal counter.
pub const MAX_VIRTUAL_LOSS: u16 = i16::MAX as u16;

#[derive(Debug, Clone, Default)]
pub struct Edge {
    /// Child position, `None` until the edge is expanded.
    node: Option<NodeId>,
    policy_prior: f32,
    value: Value,
    score: Score,
    visits: u32,
    virtual_loss: u16,
    mv: Move,
}

impl Edge {
    pub fn new(mv: Move) -> Self {
        Self {
            mv,
            ..Self::default()
        }
    }

    /// Copy the generated data of another edge, dropping statistics and the
    /// child link.
    pub fn from_generated(other: &Edge) -> Self {
        Self {
            node: None,
            policy_prior: other.policy_prior,
            value: other.value,
            score: other.score,
            visits: 0,
            virtual_loss: 0,
            mv: other.mv,
        }
    }

    #[inline]
    pub fn get_move(&self) -> Move {
        self.mv
    }

    #[inline]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.node.is_none()
    }

    pub fn set_node(&mut self, node: Option<NodeId>) {
        self.node = node;
    }

    #[inline]
    pub fn policy_prior(&self) -> f32 {
        self.policy_prior
    }

    pub fn set_policy_prior(&mut self, prior: f32) {
        self.policy_prior = prior;
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn expectation(&self, style_factor: f32) -> f32 {
        self.value.expectation(style_factor)
    }

    /// Overwrite without touching the visit count. Used when generating.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
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

    pub fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    /// Move the score toward a proof. A proven score always replaces the
    /// current one, an unproven score never overwrites a proven one.
    pub fn update_score(&mut self, score: Score) {
        if self.accepts_score(score) {
            self.score = score;
        }
    }

    /// Whether [`update_score`](Self::update_score) would change the score.
    pub fn accepts_score(&self, score: Score) -> bool {
        score != self.score && (score.is_proven() || !self.score.is_proven())
    }

    #[inline]
    pub fn virtual_loss(&self) -> u32 {
        self.virtual_loss as u32
    }

    /// Incremental mean update.
    pub fn update_value(&mut self, eval: Value) {
        self.visits += 1;
        let step = 1.0 / self.visits as f32;
        self.value += (eval - self.value) * step;
    }

    pub fn increase_virtual_loss(&mut self) {
        assert!(
            self.virtual_loss < MAX_VIRTUAL_LOSS,
            "virtual loss overflow on edge {}",
            self.mv
        );
        self.virtual_loss += 1;
    }

    pub fn decrease_virtual_loss(&mut self) {
        assert!(
            self.virtual_loss > 0,
            "virtual loss underflow on edge {}",
            self.mv
        );
        self.virtual_loss -= 1;
    }

    pub fn clear(&mut self) {
        *self = Edge::default();
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : Q={} : P={:.4} : N={}",
            self.mv, self.score, self.value, self.policy_prior, self.visits
        )?;
        if self.virtual_loss > 0 {
            write!(f, " : VL={}", self.virtual_loss)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_core::Sign;

    #[test]
    fn test_new_edge_is_leaf() {
        let edge = Edge::new(Move::new(1, 2, Sign::Cross));
        assert!(edge.is_leaf());
        assert_eq!(edge.visits(), 0);
        assert_eq!(edge.virtual_loss(), 0);
        assert!(!edge.is_proven());
    }

    #[test]
    fn test_update_value_is_running_mean() {
        let mut edge = Edge::new(Move::default());
        edge.update_value(Value::new(1.0, 0.0));
        edge.update_value(Value::new(0.0, 0.0));
        edge.update_value(Value::new(0.5, 0.5));
        assert_eq!(edge.visits(), 3);
        assert!((edge.value().win_rate - 0.5).abs() < 1e-6);
        assert!((edge.value().draw_rate - 0.5 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_update_score_only_tightens() {
        let mut edge = Edge::new(Move::default());
        edge.update_score(Score::from_eval(12));
        assert_eq!(edge.score(), Score::from_eval(12));
        edge.update_score(Score::loss_in(2));
        assert_eq!(edge.score(), Score::loss_in(2));
        edge.update_score(Score::default());
        assert_eq!(edge.score(), Score::loss_in(2));
        edge.update_score(Score::win_in(3));
        assert_eq!(edge.score(), Score::win_in(3));
        assert!(!edge.accepts_score(Score::from_eval(-5)));
        assert!(edge.accepts_score(Score::win_in(5)));
    }

    #[test]
    fn test_virtual_loss_counter() {
        let mut edge = Edge::new(Move::default());
        edge.increase_virtual_loss();
        edge.increase_virtual_loss();
        assert_eq!(edge.virtual_loss(), 2);
        edge.decrease_virtual_loss();
        edge.decrease_virtual_loss();
        assert_eq!(edge.virtual_loss(), 0);
    }

    #[test]
    #[should_panic(expected = "virtual loss underflow")]
    fn test_virtual_loss_underflow_panics() {
        let mut edge = Edge::new(Move::default());
        edge.decrease_virtual_loss();
    }

    #[test]
    fn test_from_generated_drops_statistics() {
        let mut generated = Edge::new(Move::new(3, 3, Sign::Circle));
        generated.set_policy_prior(0.25);
        generated.set_score(Score::win_in(1));
        generated.update_value(Value::new(0.7, 0.1));

        let copy = Edge::from_generated(&generated);
        assert_eq!(copy.get_move(), generated.get_move());
        assert!((copy.policy_prior() - 0.25).abs() < 1e-6);
        assert_eq!(copy.score(), Score::win_in(1));
        assert_eq!(copy.visits(), 0);
        assert!((copy.value().win_rate - 0.7).abs() < 1e-6);
    }
}
