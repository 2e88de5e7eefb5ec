//! Proven and heuristic scores.
//!
//! A score is either a proven game outcome with its distance in plies, or an
//! unproven evaluation bound. It packs into 16 bits: the outcome class in the
//! top three bits and the evaluation shifted by +4000 in the lower thirteen,
//! so comparing the raw value gives the total order used by the search:
//!
//! ```text
//! shorter win > longer win > unproven > draw > longer loss > shorter loss
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

const EVAL_OFFSET: i32 = 4000;
const EVAL_MASK: u16 = 8191;

/// Outcome class of a [`Score`], ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProvenValue {
    Loss = 0,
    Draw = 1,
    Unknown = 2,
    Win = 3,
}

impl ProvenValue {
    pub fn invert(self) -> ProvenValue {
        match self {
            ProvenValue::Loss => ProvenValue::Win,
            ProvenValue::Draw => ProvenValue::Draw,
            ProvenValue::Unknown => ProvenValue::Unknown,
            ProvenValue::Win => ProvenValue::Loss,
        }
    }

    fn from_bits(bits: u16) -> ProvenValue {
        match bits {
            0 => ProvenValue::Loss,
            1 => ProvenValue::Draw,
            3 => ProvenValue::Win,
            _ => ProvenValue::Unknown,
        }
    }
}

impl fmt::Display for ProvenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvenValue::Loss => "LOSS",
            ProvenValue::Draw => "DRAW",
            ProvenValue::Unknown => "UNKNOWN",
            ProvenValue::Win => "WIN",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Score(u16);

impl Default for Score {
    fn default() -> Self {
        Score::new(ProvenValue::Unknown, 0)
    }
}

impl Score {
    /// # Panics
    /// Debug builds assert `-4000 <= evaluation <= 4000`.
    pub fn new(proven: ProvenValue, evaluation: i32) -> Self {
        debug_assert!(
            (-EVAL_OFFSET..=EVAL_OFFSET).contains(&evaluation),
            "evaluation {} out of range",
            evaluation
        );
        let eval = evaluation.clamp(-EVAL_OFFSET, EVAL_OFFSET);
        Score(((proven as u16) << 13) | (eval + EVAL_OFFSET) as u16)
    }

    /// Unproven heuristic bound.
    pub fn from_eval(evaluation: i32) -> Self {
        Score::new(ProvenValue::Unknown, evaluation)
    }

    pub fn win_in(plies: i32) -> Self {
        Score::new(ProvenValue::Win, -plies)
    }

    pub fn loss_in(plies: i32) -> Self {
        Score::new(ProvenValue::Loss, plies)
    }

    pub fn draw_in(plies: i32) -> Self {
        Score::new(ProvenValue::Draw, plies)
    }

    pub fn win() -> Self {
        Score::win_in(0)
    }

    pub fn loss() -> Self {
        Score::loss_in(0)
    }

    pub fn draw() -> Self {
        Score::draw_in(0)
    }

    /// Negative infinity, below every loss.
    pub fn min_value() -> Self {
        Score::new(ProvenValue::Loss, -EVAL_OFFSET)
    }

    /// Positive infinity, above every win.
    pub fn max_value() -> Self {
        Score::new(ProvenValue::Win, EVAL_OFFSET)
    }

    pub fn from_raw(raw: u16) -> Self {
        Score(raw)
    }

    pub fn to_raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn proven_value(self) -> ProvenValue {
        ProvenValue::from_bits(self.0 >> 13)
    }

    #[inline]
    pub fn eval(self) -> i32 {
        (self.0 & EVAL_MASK) as i32 - EVAL_OFFSET
    }

    #[inline]
    pub fn is_proven(self) -> bool {
        self.proven_value() != ProvenValue::Unknown
    }

    #[inline]
    pub fn is_win(self) -> bool {
        self.proven_value() == ProvenValue::Win
    }

    #[inline]
    pub fn is_loss(self) -> bool {
        self.proven_value() == ProvenValue::Loss
    }

    #[inline]
    pub fn is_draw(self) -> bool {
        self.proven_value() == ProvenValue::Draw
    }

    #[inline]
    pub fn is_infinite(self) -> bool {
        self == Score::min_value() || self == Score::max_value()
    }

    /// Plies until the proven outcome. Unproven scores and infinities report
    /// the maximum distance.
    pub fn distance(self) -> i32 {
        if self.is_infinite() {
            return EVAL_OFFSET;
        }
        match self.proven_value() {
            ProvenValue::Win => -self.eval(),
            ProvenValue::Loss | ProvenValue::Draw => self.eval(),
            ProvenValue::Unknown => EVAL_OFFSET,
        }
    }

    /// One ply further from the proven outcome. Unproven scores and
    /// infinities pass through unchanged.
    pub fn increase_distance(self) -> Self {
        if self.is_infinite() || !self.is_proven() {
            return self;
        }
        let distance = (self.distance() + 1).min(EVAL_OFFSET - 1);
        self.with_distance(distance)
    }

    /// One ply closer to the proven outcome, saturating at zero.
    pub fn decrease_distance(self) -> Self {
        if self.is_infinite() || !self.is_proven() {
            return self;
        }
        let distance = (self.distance() - 1).max(0);
        self.with_distance(distance)
    }

    fn with_distance(self, distance: i32) -> Self {
        match self.proven_value() {
            ProvenValue::Win => Score::win_in(distance),
            ProvenValue::Loss => Score::loss_in(distance),
            ProvenValue::Draw => Score::draw_in(distance),
            ProvenValue::Unknown => self,
        }
    }

    /// Score of a child node as seen from the parent edge leading to it:
    /// negated and one ply further away.
    pub fn invert_up(self) -> Self {
        (-self).increase_distance()
    }

    /// Score of an edge as seen from the child node it leads to: negated and
    /// one ply closer.
    pub fn invert_down(self) -> Self {
        (-self).decrease_distance()
    }

    /// Value equivalent of a proven score. Unproven scores map to `None`.
    pub fn to_value(self) -> Option<crate::value::Value> {
        use crate::value::Value;
        match self.proven_value() {
            ProvenValue::Win => Some(Value::win()),
            ProvenValue::Draw => Some(Value::draw()),
            ProvenValue::Loss => Some(Value::loss()),
            ProvenValue::Unknown => None,
        }
    }
}

impl Neg for Score {
    type Output = Score;

    /// Wins and losses swap with the same distance; draws keep their
    /// distance; unproven bounds are negated.
    fn neg(self) -> Score {
        match self.proven_value() {
            ProvenValue::Draw => self,
            pv => Score::new(pv.invert(), -self.eval()),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Score::max_value() {
            return write!(f, "+inf");
        }
        if *self == Score::min_value() {
            return write!(f, "-inf");
        }
        match self.proven_value() {
            ProvenValue::Win => write!(f, "WIN in {}", self.distance()),
            ProvenValue::Loss => write!(f, "LOSS in {}", self.distance()),
            ProvenValue::Draw => write!(f, "DRAW in {}", self.distance()),
            ProvenValue::Unknown if self.eval() > 0 => write!(f, "+{}", self.eval()),
            ProvenValue::Unknown => write!(f, "{}", self.eval()),
        }
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score({})", self)
    }
}
