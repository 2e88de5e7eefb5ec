//! Batched search rounds.
//!
//! A [`Search`] belongs to one worker thread. Each round it:
//! 1. Selects a batch of leaves from the shared tree (under the lock)
//! 2. Offers them to the solver, then queues the rest for evaluation
//! 3. Evaluates the queue and turns the results into edges (no lock)
//! 4. Expands the leaves into the tree and backs the values up (under the lock)
//!
//! Two task buffers alternate between rounds so that backing up one batch
//! and selecting the next can share a single lock acquisition.

use crate::config::SearchConfig;
use crate::edge_generator::EdgeGenerator;
use crate::evaluator::EvaluatorError;
use crate::nn_evaluator::NNEvaluator;
use crate::search_task::{SearchTaskList, TaskState};
use crate::solver::Solver;
use crate::stats::SearchStats;
use crate::tree::{ExpandOutcome, SelectOutcome, Tree};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur during a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Search thread panicked")]
    WorkerPanicked,

    #[error("Search is already running")]
    AlreadyRunning,

    #[error("Failed to spawn search thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct Search {
    config: SearchConfig,
    buffers: [SearchTaskList; 2],
    active: usize,
    stats: SearchStats,
}

impl Search {
    pub fn new(config: SearchConfig, rows: usize, cols: usize) -> Self {
        let batch = config.max_batch_size.max(1);
        Self {
            buffers: [
                SearchTaskList::new(rows, cols, batch),
                SearchTaskList::new(rows, cols, batch),
            ],
            active: 0,
            config,
            stats: SearchStats::default(),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Tasks of the active buffer.
    pub fn tasks(&self) -> &SearchTaskList {
        &self.buffers[self.active]
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats = SearchStats::default();
    }

    /// Fill the active buffer with leaves of the tree.
    ///
    /// Stops when the buffer is full, when the root visits plus the tasks in
    /// flight reach `max_simulations`, or when the root is proven. Tasks that
    /// need no evaluation are resolved on the spot and not kept.
    pub fn select(&mut self, tree: &mut Tree, max_simulations: u32) {
        let start = Instant::now();
        let buffer = &mut self.buffers[self.active];
        let max_trials = 2 * buffer.max_size();

        for _ in 0..max_trials {
            if buffer.is_full()
                || tree.is_root_proven()
                || tree.simulation_count() as u64 + buffer.len() as u64 >= max_simulations as u64
            {
                break;
            }

            let task = buffer.next_task();
            let outcome = tree.select(task);

            if task.visited_path_length() == 0 {
                // the root itself needs evaluating, nothing else can be selected
                task.set_state(TaskState::Selected);
                break;
            }

            // a pending task already ends on this edge
            if buffer.last_is_duplicate() {
                if let Some(task) = buffer.last() {
                    tree.cancel_virtual_loss(task);
                }
                buffer.remove_last();
                self.stats.nb_duplicate_nodes += 1;
                break;
            }

            let Some(task) = buffer.last_mut() else {
                break;
            };
            match outcome {
                SelectOutcome::ReachedLeaf => task.set_state(TaskState::Selected),
                SelectOutcome::InformationLeak => {
                    tree.correct_information_leak(task);
                    tree.cancel_virtual_loss(task);
                    buffer.remove_last();
                    self.stats.nb_information_leaks += 1;
                }
                SelectOutcome::ReachedProvenEdge => {
                    let Some(pair) = task.last_pair() else {
                        buffer.remove_last();
                        continue;
                    };
                    let score = tree
                        .node_cache()
                        .get(pair.node)
                        .edge(pair.edge)
                        .score()
                        .invert_down();
                    task.set_score(score);
                    task.set_value(score.to_value().unwrap_or_default());
                    task.mark_as_processed_by_solver();
                    tree.backup(task);
                    buffer.remove_last();
                    self.stats.nb_proven_states += 1;
                }
            }
        }
        self.stats.select.record_since(start);
    }

    /// Offer every selected task to the solver. Tasks it proves skip the
    /// evaluator.
    pub fn solve(&mut self, solver: &mut dyn Solver) {
        let start = Instant::now();
        for task in self.buffers[self.active]
            .iter_mut()
            .filter(|t| t.state() == TaskState::Selected)
        {
            solver.solve(task);
            task.mark_as_processed_by_solver();
            if task.score().is_proven() {
                task.set_value(task.score().to_value().unwrap_or_default());
                task.set_state(TaskState::Proven);
            }
        }
        self.stats.solve.record_since(start);
    }

    /// Queue every unresolved task for evaluation.
    pub fn schedule_to_nn(&mut self, nn: &mut NNEvaluator) {
        let start = Instant::now();
        for task in self.buffers[self.active]
            .iter_mut()
            .filter(|t| t.state() == TaskState::Selected)
        {
            let ticket = nn.add_to_queue(task);
            task.set_ticket(Some(ticket));
            task.set_state(TaskState::AwaitingEval);
            self.stats.nb_network_evaluations += 1;
        }
        self.stats.schedule.record_since(start);
    }

    /// Run the evaluation queue and copy the results into the waiting tasks.
    pub fn evaluate(&mut self, nn: &mut NNEvaluator) -> Result<(), EvaluatorError> {
        let start = Instant::now();
        if nn.queue_len() > 0 {
            nn.evaluate_graph()?;
        }

        for task in self.buffers[self.active].iter_mut() {
            match task.state() {
                TaskState::Proven => task.set_state(TaskState::Ready),
                TaskState::AwaitingEval => {
                    let Some(result) = task.ticket().and_then(|t| nn.take_result(t)) else {
                        nn.clear_queue();
                        return Err(EvaluatorError::InvalidState(format!(
                            "no evaluation for ticket {:?}",
                            task.ticket()
                        )));
                    };
                    task.policy_mut().copy_from_slice(&result.policy);
                    if result.action_values.len() == task.action_values().len() {
                        task.action_values_mut()
                            .copy_from_slice(&result.action_values);
                    }
                    if !task.score().is_proven() {
                        task.set_value(result.value);
                    }
                    task.mark_as_processed_by_network();
                    task.set_ticket(None);
                    task.set_state(TaskState::Ready);
                }
                _ => {}
            }
        }
        nn.clear_queue();
        self.stats.evaluate.record_since(start);
        Ok(())
    }

    /// Whether every task of the active buffer can be expanded.
    pub fn are_tasks_ready(&self) -> bool {
        self.buffers[self.active].iter().all(|t| t.is_ready())
    }

    pub fn generate_edges(&mut self, generator: &mut EdgeGenerator) {
        let start = Instant::now();
        for task in self.buffers[self.active]
            .iter_mut()
            .filter(|t| t.state() == TaskState::Ready)
        {
            generator.generate(task);
        }
        self.stats.generate.record_since(start);
    }

    pub fn expand(&mut self, tree: &mut Tree) {
        let start = Instant::now();
        for task in self.buffers[self.active]
            .iter_mut()
            .filter(|t| t.state() == TaskState::Ready)
        {
            if tree.expand(task) == ExpandOutcome::AlreadyExpanded {
                trace!("wasted expansion");
                self.stats.nb_wasted_expansions += 1;
            }
            task.set_state(TaskState::Expanded);
        }
        self.stats.expand.record_since(start);
    }

    /// Back up every expanded task and empty the active buffer. Tasks that
    /// never became ready are cancelled.
    pub fn backup(&mut self, tree: &mut Tree) {
        let start = Instant::now();
        let buffer = &mut self.buffers[self.active];
        if buffer.is_empty() {
            return;
        }
        let mut backed_up = 0;
        for task in buffer.iter_mut() {
            if task.state() == TaskState::Expanded {
                tree.backup(task);
                task.set_state(TaskState::BackedUp);
                backed_up += 1;
            } else {
                tree.cancel_virtual_loss(task);
                task.set_state(TaskState::Cancelled);
                self.stats.nb_cancelled_tasks += 1;
            }
        }
        buffer.clear();
        self.stats.nb_node_count += backed_up;
        self.stats.nb_batch_rounds += 1;
        self.stats.backup.record_since(start);
        debug!(tasks = backed_up, nodes = tree.node_count(), "batch backed up");
    }

    /// Release the virtual loss of every pending task in both buffers.
    pub fn cleanup(&mut self, tree: &mut Tree) {
        for buffer in &mut self.buffers {
            for task in buffer.iter_mut() {
                if !matches!(task.state(), TaskState::BackedUp | TaskState::Cancelled) {
                    tree.cancel_virtual_loss(task);
                    task.set_state(TaskState::Cancelled);
                    self.stats.nb_cancelled_tasks += 1;
                }
            }
            buffer.clear();
        }
    }

    pub fn switch_buffer(&mut self) {
        self.active ^= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::edge_selector::EdgeSelector;
    use crate::evaluator::UniformEvaluator;
    use crate::score::Score;
    use crate::solver::{FiveInRowSolver, NoSolver};
    use crate::value::Value;
    use gomoku_core::{Board, Sign};
    use std::sync::Arc;

    fn setup(board: &Board, sign: Sign, batch: usize) -> (Tree, Search, NNEvaluator) {
        let config = SearchConfig::for_testing().with_batch_size(batch);
        let mut tree = Tree::new(TreeConfig::for_testing(), &config);
        tree.set_board(board, sign, false);
        let search = Search::new(config, board.rows(), board.cols());
        let nn = NNEvaluator::new(Arc::new(UniformEvaluator::new()), batch);
        (tree, search, nn)
    }

    fn round(
        tree: &mut Tree,
        search: &mut Search,
        nn: &mut NNEvaluator,
        solver: &mut dyn Solver,
        max_simulations: u32,
    ) {
        search.select(tree, max_simulations);
        search.solve(solver);
        search.schedule_to_nn(nn);
        search.evaluate(nn).unwrap();
        assert!(search.are_tasks_ready());
        let mut generator = tree.edge_generator().clone();
        search.generate_edges(&mut generator);
        search.expand(tree);
        search.backup(tree);
        search.switch_buffer();
    }

    fn assert_quiescent(tree: &Tree) {
        for id in tree.node_cache().live_nodes() {
            let node = tree.node_cache().get(id);
            assert_eq!(node.virtual_loss(), 0);
            assert!(node.edges().iter().all(|e| e.virtual_loss() == 0));
        }
    }

    #[test]
    fn test_first_round_expands_root_only() {
        let (mut tree, mut search, mut nn) = setup(&Board::new(7, 7), Sign::Cross, 8);
        search.select(&mut tree, 100);
        assert_eq!(search.tasks().len(), 1);
        assert_eq!(search.tasks().get(0).visited_path_length(), 0);

        search.solve(&mut NoSolver);
        search.schedule_to_nn(&mut nn);
        assert_eq!(nn.queue_len(), 1);
        search.evaluate(&mut nn).unwrap();
        let mut generator = tree.edge_generator().clone();
        search.generate_edges(&mut generator);
        search.expand(&mut tree);
        search.backup(&mut tree);

        assert!(search.tasks().is_empty());
        assert_eq!(tree.simulation_count(), 1);
        assert_eq!(tree.root_node().unwrap().number_of_edges(), 49);
        assert_eq!(search.stats().nb_network_evaluations, 1);
    }

    #[test]
    fn test_batches_respect_virtual_loss() {
        let (mut tree, mut search, mut nn) = setup(&Board::new(7, 7), Sign::Cross, 8);
        round(&mut tree, &mut search, &mut nn, &mut NoSolver, 1000);

        search.select(&mut tree, 1000);
        assert_eq!(search.tasks().len(), 8);
        let root = tree.root_node().unwrap();
        assert_eq!(root.virtual_loss(), 8);
        let mut leaves: Vec<_> = search.tasks().iter().filter_map(|t| t.last_pair()).collect();
        leaves.dedup();
        assert_eq!(leaves.len(), 8);

        search.cleanup(&mut tree);
        assert_quiescent(&tree);
        assert_eq!(search.stats().nb_cancelled_tasks, 8);
    }

    #[test]
    fn test_visits_count_backups() {
        let (mut tree, mut search, mut nn) = setup(&Board::new(7, 7), Sign::Cross, 4);
        for _ in 0..20 {
            round(&mut tree, &mut search, &mut nn, &mut NoSolver, 1000);
        }
        let root = tree.root_node().unwrap();
        assert_eq!(root.visits() as u64, search.stats().nb_node_count);
        assert_eq!(root.visits(), 1 + root.total_edge_visits());
        assert_quiescent(&tree);
    }

    #[test]
    fn test_simulation_budget() {
        let (mut tree, mut search, mut nn) = setup(&Board::new(7, 7), Sign::Cross, 8);
        for _ in 0..10 {
            round(&mut tree, &mut search, &mut nn, &mut NoSolver, 20);
        }
        assert_eq!(tree.simulation_count(), 20);
    }

    #[test]
    fn test_solver_finds_win() {
        let board: Board = "XXXX___\nOOOO___\n_______\n_______\n_______\n_______\n_______"
            .parse()
            .unwrap();
        let (mut tree, mut search, mut nn) = setup(&board, Sign::Cross, 4);
        let mut solver = FiveInRowSolver::new();
        round(&mut tree, &mut search, &mut nn, &mut solver, 1000);

        assert!(tree.is_root_proven());
        assert_eq!(tree.root_node().unwrap().score(), Score::win_in(1));
        assert_eq!(tree.root_node().unwrap().number_of_edges(), 1);
        assert_eq!(search.stats().nb_network_evaluations, 0);

        // nothing left to select once the root is proven
        search.select(&mut tree, 1000);
        assert!(search.tasks().is_empty());
    }

    #[test]
    fn test_proven_edges_are_backed_up_without_evaluation() {
        let board: Board = "X__".parse().unwrap();
        let (mut tree, mut search, mut nn) = setup(&board, Sign::Circle, 4);
        tree.set_edge_selector(EdgeSelector::MaxValue { style_factor: 0.5 });
        round(&mut tree, &mut search, &mut nn, &mut NoSolver, 1000);

        let root = tree.root_id().unwrap();
        tree.node_cache_mut()
            .get_mut(root)
            .edge_mut(0)
            .set_score(Score::draw_in(1));

        search.select(&mut tree, 1000);
        assert!(search.tasks().is_empty());
        assert_eq!(search.stats().nb_proven_states, 8);
        assert_eq!(search.stats().nb_network_evaluations, 1);

        let root = tree.root_node().unwrap();
        assert_eq!(root.visits(), 9);
        assert_eq!(root.edge(0).visits(), 8);
        assert!((root.edge(0).value().draw_rate - 1.0).abs() < 1e-6);
        assert!(!root.is_proven());
        assert_quiescent(&tree);
    }

    #[test]
    fn test_duplicate_proven_edge_is_dropped() {
        let board: Board = "XO_".parse().unwrap();
        let (mut tree, mut search, mut nn) = setup(&board, Sign::Cross, 4);
        round(&mut tree, &mut search, &mut nn, &mut NoSolver, 1000);
        assert_eq!(tree.root_node().unwrap().number_of_edges(), 1);

        search.select(&mut tree, 1000);
        assert_eq!(search.tasks().len(), 1);
        assert_eq!(search.stats().nb_duplicate_nodes, 1);

        // the edge held by the pending task gets proven meanwhile
        let root = tree.root_id().unwrap();
        tree.node_cache_mut()
            .get_mut(root)
            .edge_mut(0)
            .set_score(Score::draw_in(1));

        search.select(&mut tree, 1000);
        assert_eq!(search.tasks().len(), 1);
        assert_eq!(search.stats().nb_duplicate_nodes, 2);
        assert_eq!(search.stats().nb_proven_states, 0);
        let root = tree.root_node().unwrap();
        assert_eq!(root.virtual_loss(), 1);
        assert_eq!(root.edge(0).visits(), 0);

        search.cleanup(&mut tree);
        assert_quiescent(&tree);
    }

    #[test]
    fn test_missing_result_is_an_error() {
        let (mut tree, mut search, _) = setup(&Board::new(5, 5), Sign::Cross, 2);
        search.select(&mut tree, 10);
        search.schedule_to_nn(&mut NNEvaluator::new(Arc::new(UniformEvaluator::new()), 2));
        let mut other = NNEvaluator::new(
            Arc::new(UniformEvaluator::with_value(Value::new(0.1, 0.0))),
            2,
        );
        assert!(matches!(
            search.evaluate(&mut other),
            Err(EvaluatorError::InvalidState(_))
        ));
        search.cleanup(&mut tree);
        assert!(search.tasks().is_empty());
    }
}
