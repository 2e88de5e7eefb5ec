//! Exact tactical solvers consulted before the network.
//!
//! A solver may prove the leaf of a task, attach proven scores to individual
//! moves, and restrict the candidate moves to forced defences. Anything it
//! cannot decide is left for the evaluator.

use crate::score::Score;
use crate::search_task::SearchTask;
use gomoku_core::{Board, Move, Sign};

/// Solvers are owned by one worker thread each.
pub trait Solver: Send {
    fn solve(&mut self, task: &mut SearchTask);
}

/// Solver that never proves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSolver;

impl Solver for NoSolver {
    fn solve(&mut self, _task: &mut SearchTask) {}
}

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Whether a stone of `sign` at (row, col) belongs to a line of five or more.
/// The cell itself is counted as `sign` whatever it holds.
pub fn makes_five(board: &Board, row: usize, col: usize, sign: Sign) -> bool {
    let count_from = |dr: isize, dc: isize| {
        let mut count = 0;
        let mut r = row as isize + dr;
        let mut c = col as isize + dc;
        while r >= 0
            && c >= 0
            && (r as usize) < board.rows()
            && (c as usize) < board.cols()
            && board.get(r as usize, c as usize) == sign
        {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    };
    DIRECTIONS
        .iter()
        .any(|&(dr, dc)| 1 + count_from(dr, dc) + count_from(-dr, -dc) >= 5)
}

/// Whether `sign` already has five in a row anywhere on the board.
pub fn has_five(board: &Board, sign: Sign) -> bool {
    (0..board.rows()).any(|row| {
        (0..board.cols()).any(|col| board.get(row, col) == sign && makes_five(board, row, col, sign))
    })
}

/// Freestyle five-in-a-row detection one ply deep.
///
/// * the opponent already has five: the side to move has lost;
/// * the board is full: draw;
/// * a move completes five: win in one;
/// * the opponent threatens five on two or more cells: loss in two;
/// * the opponent threatens five on one cell: that cell is the only move.
#[derive(Debug, Clone, Default)]
pub struct FiveInRowSolver {
    threats: Vec<(usize, usize)>,
}

impl FiveInRowSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for FiveInRowSolver {
    fn solve(&mut self, task: &mut SearchTask) {
        let sign = task.sign_to_move();
        let opponent = sign.invert();
        let cols = task.board().cols();

        if has_five(task.board(), opponent) {
            task.set_score(Score::loss());
            return;
        }
        if task.board().is_full() {
            task.set_score(Score::draw());
            return;
        }

        let empty: Vec<(usize, usize)> = task.board().empty_cells().collect();
        let mut winning = false;
        self.threats.clear();
        for &(row, col) in &empty {
            if makes_five(task.board(), row, col, sign) {
                winning = true;
                task.action_scores_mut()[row * cols + col] = Score::win_in(1);
            } else if makes_five(task.board(), row, col, opponent) {
                self.threats.push((row, col));
            }
        }
        if winning {
            task.set_score(Score::win_in(1));
            return;
        }
        if self.threats.is_empty() {
            return;
        }

        // Every move that does not block loses to the opponent's five.
        for (row, col) in empty {
            if self.threats.len() > 1 || !self.threats.contains(&(row, col)) {
                task.action_scores_mut()[row * cols + col] = Score::loss_in(2);
            }
        }
        if self.threats.len() > 1 {
            task.set_score(Score::loss_in(2));
        } else {
            let (row, col) = self.threats[0];
            task.set_must_defend(true);
            task.add_edge(Move::new(row, col, sign));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_for(text: &str, sign: Sign) -> SearchTask {
        let board: Board = text.parse().unwrap();
        let mut task = SearchTask::new(board.rows(), board.cols());
        task.set(&board, sign);
        task
    }

    #[test]
    fn test_makes_five() {
        let board: Board = "XXXX___\n_______\n_______".parse().unwrap();
        assert!(makes_five(&board, 0, 4, Sign::Cross));
        assert!(!makes_five(&board, 0, 5, Sign::Cross));
        assert!(!makes_five(&board, 0, 4, Sign::Circle));
    }

    #[test]
    fn test_no_solver_leaves_task_untouched() {
        let mut task = task_for("XXXX___\n_______", Sign::Cross);
        NoSolver.solve(&mut task);
        assert!(!task.score().is_proven());
    }

    #[test]
    fn test_opponent_five_is_loss() {
        let mut task = task_for("XXXXX__\nOOOO___", Sign::Circle);
        FiveInRowSolver::new().solve(&mut task);
        assert_eq!(task.score(), Score::loss());
    }

    #[test]
    fn test_full_board_is_draw() {
        let mut task = task_for("XO\nOX", Sign::Cross);
        FiveInRowSolver::new().solve(&mut task);
        assert_eq!(task.score(), Score::draw());
    }

    #[test]
    fn test_winning_move() {
        let mut task = task_for("XXXX___\nOOO____\n_______", Sign::Cross);
        FiveInRowSolver::new().solve(&mut task);
        assert_eq!(task.score(), Score::win_in(1));
        assert_eq!(task.action_scores()[4], Score::win_in(1));
        assert!(!task.action_scores()[5].is_proven());
    }

    #[test]
    fn test_single_threat_forces_defence() {
        let mut task = task_for("XXXX___\nOOO____\n_______", Sign::Circle);
        FiveInRowSolver::new().solve(&mut task);
        assert!(!task.score().is_proven());
        assert!(task.must_defend());
        assert_eq!(task.edges().len(), 1);
        assert_eq!(task.edges()[0].get_move(), Move::new(0, 4, Sign::Circle));
        assert!(!task.action_scores()[4].is_proven());
        assert_eq!(task.action_scores()[5], Score::loss_in(2));
    }

    #[test]
    fn test_double_threat_is_loss() {
        let mut task = task_for("_XXXX__\nOOO____\n_______", Sign::Circle);
        FiveInRowSolver::new().solve(&mut task);
        assert_eq!(task.score(), Score::loss_in(2));
        assert_eq!(task.action_scores()[0], Score::loss_in(2));
        assert_eq!(task.action_scores()[5], Score::loss_in(2));
    }
}
