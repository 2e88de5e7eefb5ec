//! Evaluator trait for position evaluation.
//!
//! The evaluator provides a policy (move probabilities per cell), per-move
//! value estimates and a whole-position value. In play this is a neural
//! network; for testing we provide a uniform evaluator.

use crate::value::Value;
use gomoku_core::{Board, Sign};
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Expected {expected} outputs, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}

/// Result of evaluating one position.
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Row-major probability per cell. Occupied cells should be 0.0.
    pub policy: Vec<f32>,

    /// Row-major value of playing each cell, from the mover's perspective.
    /// May be empty when the model has no action-value head.
    pub action_values: Vec<Value>,

    /// Value of the position for the side to move.
    pub value: Value,
}

/// Trait for position evaluators.
///
/// Evaluators are shared between worker threads, so they take `&self`;
/// implementations wrapping a non-reentrant model guard it internally.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, board: &Board, sign_to_move: Sign) -> Result<EvalResult, EvaluatorError>;

    /// Batch evaluate multiple positions (optional optimization).
    /// Default implementation calls evaluate() in a loop.
    fn evaluate_batch(
        &self,
        positions: &[(&Board, Sign)],
    ) -> Result<Vec<EvalResult>, EvaluatorError> {
        positions
            .iter()
            .map(|(board, sign)| self.evaluate(board, *sign))
            .collect()
    }
}

/// Uniform evaluator that assigns equal probability to all empty cells.
/// Value is constant. Useful for testing the search without a model.
#[derive(Debug, Clone)]
pub struct UniformEvaluator {
    value: Value,
}

impl Default for UniformEvaluator {
    fn default() -> Self {
        Self {
            value: Value::new(0.5, 0.0),
        }
    }
}

impl UniformEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: Value) -> Self {
        Self { value }
    }
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, board: &Board, _sign_to_move: Sign) -> Result<EvalResult, EvaluatorError> {
        let mut policy = vec![0.0; board.size()];
        let num_empty = board.size() - board.move_count();

        if num_empty > 0 {
            let prob = 1.0 / num_empty as f32;
            for (p, cell) in policy.iter_mut().zip(board.cells()) {
                if *cell == Sign::None {
                    *p = prob;
                }
            }
        }

        Ok(EvalResult {
            policy,
            action_values: Vec::new(),
            value: self.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_core::Move;

    #[test]
    fn test_uniform_evaluator() {
        let eval = UniformEvaluator::new();
        let mut board = Board::new(3, 3);
        board.put_move(Move::new(0, 0, Sign::Cross));
        board.put_move(Move::new(1, 1, Sign::Circle));

        let result = eval.evaluate(&board, Sign::Cross).unwrap();
        let expected = 1.0 / 7.0;
        assert!(result.policy[0].abs() < 1e-6);
        assert!(result.policy[4].abs() < 1e-6);
        assert!((result.policy[1] - expected).abs() < 1e-6);
        assert!((result.policy.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((result.value.win_rate - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_evaluator_full_board() {
        let eval = UniformEvaluator::with_value(Value::draw());
        let board: Board = "XO\nOX".parse().unwrap();
        let result = eval.evaluate(&board, Sign::Cross).unwrap();
        assert!(result.policy.iter().all(|p| p.abs() < 1e-6));
        assert!((result.value.draw_rate - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_default_batch_matches_single() {
        let eval = UniformEvaluator::new();
        let a = Board::new(3, 3);
        let b: Board = "X__\n___\n___".parse().unwrap();
        let results = eval
            .evaluate_batch(&[(&a, Sign::Cross), (&b, Sign::Circle)])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[1].policy[1] - 0.125).abs() < 1e-6);
    }
}
