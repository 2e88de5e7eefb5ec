//! Batched evaluation queue.
//!
//! Each worker owns an `NNEvaluator`. Tasks are queued during scheduling,
//! evaluated together outside the tree lock, and the results are handed back
//! by ticket.

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};
use crate::search_task::SearchTask;
use crate::stats::TimedStat;
use gomoku_core::{Board, Sign};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct NNEvaluatorStats {
    pub evaluations: u64,
    pub batches: u64,
    pub compute: TimedStat,
}

pub struct NNEvaluator {
    evaluator: Arc<dyn Evaluator>,
    batch_size: usize,
    /// Queued positions. Boards are reused across rounds.
    queue: Vec<(Board, Sign)>,
    queued: usize,
    results: Vec<Option<EvalResult>>,
    stats: NNEvaluatorStats,
}

impl std::fmt::Debug for NNEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NNEvaluator")
            .field("batch_size", &self.batch_size)
            .field("queued", &self.queued)
            .finish_non_exhaustive()
    }
}

impl NNEvaluator {
    pub fn new(evaluator: Arc<dyn Evaluator>, batch_size: usize) -> Self {
        Self {
            evaluator,
            batch_size: batch_size.max(1),
            queue: Vec::new(),
            queued: 0,
            results: Vec::new(),
            stats: NNEvaluatorStats::default(),
        }
    }

    /// Queue the leaf position of a task. Returns the ticket for
    /// [`take_result`](Self::take_result).
    pub fn add_to_queue(&mut self, task: &SearchTask) -> usize {
        let ticket = self.queued;
        if ticket == self.queue.len() {
            self.queue.push((task.board().clone(), task.sign_to_move()));
        } else {
            let (board, sign) = &mut self.queue[ticket];
            board.clone_from(task.board());
            *sign = task.sign_to_move();
        }
        self.queued += 1;
        ticket
    }

    pub fn queue_len(&self) -> usize {
        self.queued
    }

    /// Evaluate everything queued, in chunks of the batch size.
    pub fn evaluate_graph(&mut self) -> Result<(), EvaluatorError> {
        let start = Instant::now();
        self.results.clear();
        self.results.reserve(self.queued);

        for chunk in self.queue[..self.queued].chunks(self.batch_size) {
            let positions: Vec<(&Board, Sign)> = chunk.iter().map(|(b, s)| (b, *s)).collect();
            let batch = self.evaluator.evaluate_batch(&positions)?;
            if batch.len() != positions.len() {
                return Err(EvaluatorError::ShapeMismatch {
                    expected: positions.len(),
                    got: batch.len(),
                });
            }
            for (result, (board, _)) in batch.iter().zip(chunk) {
                if result.policy.len() != board.size() {
                    return Err(EvaluatorError::ShapeMismatch {
                        expected: board.size(),
                        got: result.policy.len(),
                    });
                }
            }
            self.results.extend(batch.into_iter().map(Some));
            self.stats.batches += 1;
        }

        self.stats.evaluations += self.queued as u64;
        self.stats.compute.record_since(start);
        trace!(positions = self.queued, "evaluated graph");
        Ok(())
    }

    /// Take the result for a ticket. Each result can be taken once.
    pub fn take_result(&mut self, ticket: usize) -> Option<EvalResult> {
        self.results.get_mut(ticket).and_then(Option::take)
    }

    /// Drop queued positions and results.
    pub fn clear_queue(&mut self) {
        self.queued = 0;
        self.results.clear();
    }

    pub fn stats(&self) -> &NNEvaluatorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use crate::value::Value;
    use gomoku_core::Move;

    struct WrongShape;

    impl Evaluator for WrongShape {
        fn evaluate(&self, _board: &Board, _sign: Sign) -> Result<EvalResult, EvaluatorError> {
            Ok(EvalResult {
                policy: vec![1.0],
                action_values: Vec::new(),
                value: Value::default(),
            })
        }
    }

    fn task_at(moves: &[Move], sign: Sign) -> SearchTask {
        let board = Board::from_moves(5, 5, moves).unwrap();
        let mut task = SearchTask::new(5, 5);
        task.set(&board, sign);
        task
    }

    #[test]
    fn test_queue_and_take() {
        let mut nn = NNEvaluator::new(Arc::new(UniformEvaluator::new()), 2);
        let t0 = task_at(&[], Sign::Cross);
        let t1 = task_at(&[Move::new(0, 0, Sign::Cross)], Sign::Circle);
        let t2 = task_at(&[Move::new(0, 0, Sign::Cross), Move::new(0, 1, Sign::Circle)], Sign::Cross);

        assert_eq!(nn.add_to_queue(&t0), 0);
        assert_eq!(nn.add_to_queue(&t1), 1);
        assert_eq!(nn.add_to_queue(&t2), 2);
        nn.evaluate_graph().unwrap();

        let r1 = nn.take_result(1).unwrap();
        assert!(r1.policy[0].abs() < 1e-6);
        assert!((r1.policy[1] - 1.0 / 24.0).abs() < 1e-6);
        assert!(nn.take_result(1).is_none());
        assert_eq!(nn.stats().batches, 2);
        assert_eq!(nn.stats().evaluations, 3);
    }

    #[test]
    fn test_queue_reuse_after_clear() {
        let mut nn = NNEvaluator::new(Arc::new(UniformEvaluator::new()), 8);
        nn.add_to_queue(&task_at(&[], Sign::Cross));
        nn.evaluate_graph().unwrap();
        nn.clear_queue();
        assert_eq!(nn.queue_len(), 0);

        let t = task_at(&[Move::new(2, 2, Sign::Cross)], Sign::Circle);
        assert_eq!(nn.add_to_queue(&t), 0);
        nn.evaluate_graph().unwrap();
        assert!(nn.take_result(0).unwrap().policy[12].abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut nn = NNEvaluator::new(Arc::new(WrongShape), 4);
        nn.add_to_queue(&task_at(&[], Sign::Cross));
        let err = nn.evaluate_graph().unwrap_err();
        assert!(matches!(
            err,
            EvaluatorError::ShapeMismatch {
                expected: 25,
                got: 1
            }
        ));
    }
}
