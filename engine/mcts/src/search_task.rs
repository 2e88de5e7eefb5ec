//! In-flight units of search work.
//!
//! A [`SearchTask`] records the path walked during selection, the leaf
//! position it ended in, and everything the evaluator and solver produced for
//! that leaf. Tasks are pooled in a [`SearchTaskList`] and reused between
//! rounds so their buffers are allocated once.

use crate::edge::Edge;
use crate::node::NodeId;
use crate::score::Score;
use crate::value::Value;
use gomoku_core::{Board, Move, Sign};
use std::fmt;

/// One step of a selected path: the node and the index of the chosen edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEdgePair {
    pub node: NodeId,
    pub edge: usize,
}

/// Lifecycle of a task within one batch round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Created,
    Selected,
    /// Resolved by the solver or by reaching a proven edge; no evaluation
    /// needed.
    Proven,
    AwaitingEval,
    Ready,
    Expanded,
    BackedUp,
    /// Dropped before backup. Its virtual loss has been released.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SearchTask {
    visited_path: Vec<NodeEdgePair>,
    edges: Vec<Edge>,
    board: Board,
    policy: Vec<f32>,
    action_values: Vec<Value>,
    value: Value,
    action_scores: Vec<Score>,
    score: Score,
    sign_to_move: Sign,
    processed_by_network: bool,
    processed_by_solver: bool,
    must_defend: bool,
    state: TaskState,
    ticket: Option<usize>,
}

impl SearchTask {
    pub fn new(rows: usize, cols: usize) -> Self {
        let size = rows * cols;
        Self {
            visited_path: Vec::new(),
            edges: Vec::new(),
            board: Board::new(rows, cols),
            policy: vec![0.0; size],
            action_values: vec![Value::default(); size],
            value: Value::default(),
            action_scores: vec![Score::default(); size],
            score: Score::default(),
            sign_to_move: Sign::None,
            processed_by_network: false,
            processed_by_solver: false,
            must_defend: false,
            state: TaskState::Created,
            ticket: None,
        }
    }

    /// Reset for a new selection starting at `base`.
    pub fn set(&mut self, base: &Board, sign_to_move: Sign) {
        self.visited_path.clear();
        self.edges.clear();
        self.board.clone_from(base);

        let size = base.size();
        self.policy.clear();
        self.policy.resize(size, 0.0);
        self.action_values.clear();
        self.action_values.resize(size, Value::default());
        self.action_scores.clear();
        self.action_scores.resize(size, Score::default());

        self.value = Value::default();
        self.score = Score::default();
        self.sign_to_move = sign_to_move;
        self.processed_by_network = false;
        self.processed_by_solver = false;
        self.must_defend = false;
        self.state = TaskState::Created;
        self.ticket = None;
    }

    /// Record one step of the path and play its move on the task board.
    pub fn append(&mut self, node: NodeId, edge: usize, mv: Move) {
        debug_assert_eq!(mv.sign, self.sign_to_move);
        self.visited_path.push(NodeEdgePair { node, edge });
        self.board.put_move(mv);
        self.sign_to_move = mv.sign.invert();
    }

    #[inline]
    pub fn visited_path(&self) -> &[NodeEdgePair] {
        &self.visited_path
    }

    #[inline]
    pub fn visited_path_length(&self) -> usize {
        self.visited_path.len()
    }

    pub fn last_pair(&self) -> Option<NodeEdgePair> {
        self.visited_path.last().copied()
    }

    /// Distance in plies from the root of the search.
    #[inline]
    pub fn relative_depth(&self) -> usize {
        self.visited_path.len()
    }

    /// Number of stones on the leaf board.
    #[inline]
    pub fn absolute_depth(&self) -> usize {
        self.board.move_count()
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn edges_mut(&mut self) -> &mut Vec<Edge> {
        &mut self.edges
    }

    /// Add a candidate move for the side to move.
    ///
    /// # Panics
    /// Debug builds assert the cell is empty and the move is not a duplicate.
    pub fn add_edge(&mut self, mv: Move) {
        debug_assert!(
            self.board.is_empty_at(mv.row(), mv.col()),
            "edge {} points at an occupied cell",
            mv
        );
        debug_assert!(
            self.edges.iter().all(|e| e.get_move() != mv),
            "duplicate edge {}",
            mv
        );
        self.edges.push(Edge::new(mv));
    }

    #[inline]
    pub fn policy(&self) -> &[f32] {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut [f32] {
        &mut self.policy
    }

    #[inline]
    pub fn action_values(&self) -> &[Value] {
        &self.action_values
    }

    pub fn action_values_mut(&mut self) -> &mut [Value] {
        &mut self.action_values
    }

    #[inline]
    pub fn action_scores(&self) -> &[Score] {
        &self.action_scores
    }

    pub fn action_scores_mut(&mut self) -> &mut [Score] {
        &mut self.action_scores
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    #[inline]
    pub fn score(&self) -> Score {
        self.score
    }

    pub fn set_score(&mut self, score: Score) {
        self.score = score;
    }

    pub fn was_processed_by_network(&self) -> bool {
        self.processed_by_network
    }

    pub fn mark_as_processed_by_network(&mut self) {
        self.processed_by_network = true;
    }

    pub fn was_processed_by_solver(&self) -> bool {
        self.processed_by_solver
    }

    pub fn mark_as_processed_by_solver(&mut self) {
        self.processed_by_solver = true;
    }

    pub fn must_defend(&self) -> bool {
        self.must_defend
    }

    pub fn set_must_defend(&mut self, flag: bool) {
        self.must_defend = flag;
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub fn ticket(&self) -> Option<usize> {
        self.ticket
    }

    pub(crate) fn set_ticket(&mut self, ticket: Option<usize>) {
        self.ticket = ticket;
    }

    /// Evaluated by the network, or resolved exactly so no evaluation is
    /// needed.
    pub fn is_ready(&self) -> bool {
        self.processed_by_network || (self.processed_by_solver && self.score.is_proven())
    }
}

impl fmt::Display for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SearchTask: state={:?} sign_to_move={} network={} solver={} must_defend={}",
            self.state,
            self.sign_to_move,
            self.processed_by_network,
            self.processed_by_solver,
            self.must_defend
        )?;
        writeln!(f, "value = {} score = {}", self.value, self.score)?;
        for pair in &self.visited_path {
            writeln!(f, "  {} -> edge {}", pair.node, pair.edge)?;
        }
        write!(f, "{}", self.board)?;
        for edge in &self.edges {
            writeln!(f, "  {}", edge)?;
        }
        Ok(())
    }
}

/// Pool of reusable tasks forming one batch.
#[derive(Debug, Clone)]
pub struct SearchTaskList {
    tasks: Vec<SearchTask>,
    stored: usize,
    max_size: usize,
    rows: usize,
    cols: usize,
}

impl SearchTaskList {
    pub fn new(rows: usize, cols: usize, max_size: usize) -> Self {
        Self {
            tasks: Vec::new(),
            stored: 0,
            max_size,
            rows,
            cols,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stored
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.stored >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Claim the next task slot. The caller is expected to `set` it.
    pub fn next_task(&mut self) -> &mut SearchTask {
        if self.stored == self.tasks.len() {
            self.tasks.push(SearchTask::new(self.rows, self.cols));
        }
        self.stored += 1;
        &mut self.tasks[self.stored - 1]
    }

    /// Return the most recently claimed slot to the pool.
    pub fn remove_last(&mut self) {
        debug_assert!(self.stored > 0);
        self.stored -= 1;
    }

    pub fn clear(&mut self) {
        self.stored = 0;
    }

    pub fn get(&self, index: usize) -> &SearchTask {
        debug_assert!(index < self.stored);
        &self.tasks[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut SearchTask {
        debug_assert!(index < self.stored);
        &mut self.tasks[index]
    }

    pub fn last(&self) -> Option<&SearchTask> {
        self.tasks[..self.stored].last()
    }

    pub fn last_mut(&mut self) -> Option<&mut SearchTask> {
        self.tasks[..self.stored].last_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchTask> {
        self.tasks[..self.stored].iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SearchTask> {
        self.tasks[..self.stored].iter_mut()
    }

    /// Whether the last task ended on the same edge as an earlier task.
    pub fn last_is_duplicate(&self) -> bool {
        let Some((last, rest)) = self.tasks[..self.stored].split_last() else {
            return false;
        };
        let Some(pair) = last.last_pair() else {
            return false;
        };
        rest.iter().any(|t| t.last_pair() == Some(pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(slot: u32) -> NodeId {
        NodeId {
            slot,
            generation: 0,
        }
    }

    #[test]
    fn test_set_resets_everything() {
        let base = Board::new(15, 15);
        let mut task = SearchTask::new(15, 15);
        task.set(&base, Sign::Cross);
        task.append(id(0), 0, Move::new(7, 7, Sign::Cross));
        task.add_edge(Move::new(0, 0, Sign::Circle));
        task.mark_as_processed_by_network();
        task.set_value(Value::new(0.3, 0.1));

        task.set(&base, Sign::Cross);
        assert_eq!(task.visited_path_length(), 0);
        assert!(task.edges().is_empty());
        assert!(task.board().is_empty());
        assert!(!task.was_processed_by_network());
        assert_eq!(task.state(), TaskState::Created);
        assert_eq!(task.policy().len(), 225);
    }

    #[test]
    fn test_append_plays_move_and_flips_side() {
        let mut task = SearchTask::new(15, 15);
        task.set(&Board::new(15, 15), Sign::Cross);
        task.append(id(0), 3, Move::new(7, 7, Sign::Cross));
        assert_eq!(task.sign_to_move(), Sign::Circle);
        assert_eq!(task.board().get(7, 7), Sign::Cross);
        assert_eq!(task.relative_depth(), 1);
        assert_eq!(task.absolute_depth(), 1);
        assert_eq!(task.last_pair(), Some(NodeEdgePair { node: id(0), edge: 3 }));
    }

    #[test]
    fn test_is_ready() {
        let mut task = SearchTask::new(5, 5);
        task.set(&Board::new(5, 5), Sign::Cross);
        assert!(!task.is_ready());
        task.mark_as_processed_by_solver();
        assert!(!task.is_ready());
        task.set_score(Score::win_in(1));
        assert!(task.is_ready());
    }

    #[test]
    fn test_task_list_reuses_slots() {
        let base = Board::new(5, 5);
        let mut list = SearchTaskList::new(5, 5, 2);
        list.next_task().set(&base, Sign::Cross);
        list.next_task().set(&base, Sign::Cross);
        assert!(list.is_full());
        list.remove_last();
        assert_eq!(list.len(), 1);
        list.clear();
        assert!(list.is_empty());
        list.next_task().set(&base, Sign::Circle);
        assert_eq!(list.get(0).sign_to_move(), Sign::Circle);
    }

    #[test]
    fn test_last_is_duplicate() {
        let base = Board::new(5, 5);
        let mut list = SearchTaskList::new(5, 5, 4);
        let t = list.next_task();
        t.set(&base, Sign::Cross);
        t.append(id(1), 2, Move::new(0, 0, Sign::Cross));
        let t = list.next_task();
        t.set(&base, Sign::Cross);
        t.append(id(1), 3, Move::new(0, 1, Sign::Cross));
        assert!(!list.last_is_duplicate());
        let t = list.next_task();
        t.set(&base, Sign::Cross);
        t.append(id(1), 2, Move::new(0, 0, Sign::Cross));
        assert!(list.last_is_duplicate());
    }
}
