//! Win/draw rate estimates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

const VALID_TOLERANCE: f32 = 0.001;

/// Statistical outcome estimate from the point of view of one side.
///
/// The loss rate is derived as `1 - win - draw`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Value {
    pub win_rate: f32,
    pub draw_rate: f32,
}

impl Value {
    pub const fn new(win_rate: f32, draw_rate: f32) -> Self {
        Self {
            win_rate,
            draw_rate,
        }
    }

    pub const fn win() -> Self {
        Self::new(1.0, 0.0)
    }

    pub const fn draw() -> Self {
        Self::new(0.0, 1.0)
    }

    pub const fn loss() -> Self {
        Self::new(0.0, 0.0)
    }

    #[inline]
    pub fn loss_rate(&self) -> f32 {
        1.0 - (self.win_rate + self.draw_rate)
    }

    /// Expected score where a draw counts as `style_factor` of a win.
    #[inline]
    pub fn expectation(&self, style_factor: f32) -> f32 {
        debug_assert!((0.0..=1.0).contains(&style_factor));
        self.win_rate + style_factor * self.draw_rate
    }

    /// The same estimate from the opponent's point of view.
    #[inline]
    pub fn inverted(&self) -> Value {
        Value::new(self.loss_rate(), self.draw_rate)
    }

    /// L1 norm, used to measure the distance between two estimates.
    pub fn abs(&self) -> f32 {
        self.win_rate.abs() + self.draw_rate.abs()
    }

    pub fn is_valid(&self) -> bool {
        let range = -VALID_TOLERANCE..=1.0 + VALID_TOLERANCE;
        range.contains(&self.win_rate)
            && range.contains(&self.draw_rate)
            && range.contains(&self.loss_rate())
    }

    pub fn clip_to_bounds(&mut self) {
        self.win_rate = self.win_rate.clamp(0.0, 1.0);
        self.draw_rate = self.draw_rate.clamp(0.0, 1.0 - self.win_rate);
    }
}

impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        Value::new(self.win_rate + rhs.win_rate, self.draw_rate + rhs.draw_rate)
    }
}

impl AddAssign for Value {
    fn add_assign(&mut self, rhs: Value) {
        *self = *self + rhs;
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        Value::new(self.win_rate - rhs.win_rate, self.draw_rate - rhs.draw_rate)
    }
}

impl Mul<f32> for Value {
    type Output = Value;

    fn mul(self, rhs: f32) -> Value {
        Value::new(self.win_rate * rhs, self.draw_rate * rhs)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} : {:.3} : {:.3}",
            self.win_rate,
            self.draw_rate,
            self.loss_rate()
        )
    }
}
