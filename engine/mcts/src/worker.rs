//! Worker threads sharing one tree.
//!
//! Every [`SearchThread`] runs batch rounds against the shared tree, taking
//! the low-priority lock only to select, expand and back up. The
//! [`SearchEngine`] owns the threads and acts as the controller: it polls
//! the stop conditions under the high-priority lock and raises the stop
//! flag, which workers observe between rounds.

use crate::config::{EngineConfig, SearchConfig};
use crate::edge_generator::EdgeGenerator;
use crate::evaluator::Evaluator;
use crate::nn_evaluator::NNEvaluator;
use crate::priority_mutex::PriorityMutex;
use crate::search::{Search, SearchError};
use crate::solver::{NoSolver, Solver};
use crate::stats::SearchStats;
use crate::tree::Tree;
use gomoku_core::{Board, Sign};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Whether the search has nothing left to gain under `config`.
pub fn should_stop(tree: &Tree, config: &EngineConfig) -> bool {
    tree.node_count() >= config.max_nodes
        || tree.max_depth() >= config.max_depth
        || tree.is_root_proven()
        || tree.simulation_count() >= config.max_simulations
        || (config.stop_on_single_move
            && (tree.has_single_move() || tree.has_single_non_losing_move()))
}

pub struct SearchThread {
    tree: Arc<PriorityMutex<Tree>>,
    stop: Arc<AtomicBool>,
    config: EngineConfig,
    search: Search,
    nn: NNEvaluator,
    solver: Box<dyn Solver>,
    generator: EdgeGenerator,
}

impl SearchThread {
    pub fn new(
        tree: Arc<PriorityMutex<Tree>>,
        stop: Arc<AtomicBool>,
        config: EngineConfig,
        search_config: SearchConfig,
        evaluator: Arc<dyn Evaluator>,
        solver: Box<dyn Solver>,
    ) -> Self {
        let (rows, cols, generator) = {
            let tree = tree.lock_high();
            (
                tree.base_board().rows(),
                tree.base_board().cols(),
                tree.edge_generator().clone(),
            )
        };
        Self {
            nn: NNEvaluator::new(evaluator, config.eval_batch_size),
            search: Search::new(search_config, rows, cols),
            tree,
            stop,
            config,
            solver,
            generator,
        }
    }

    /// Run rounds until stopped. Virtual loss of unfinished tasks is always
    /// released before returning.
    pub fn run(mut self) -> Result<SearchStats, SearchError> {
        let result = self.run_rounds();
        {
            let mut tree = self.tree.lock_low();
            self.search.cleanup(&mut tree);
        }
        if let Err(e) = &result {
            warn!(error = %e, "search thread failed");
        }
        result.map(|()| self.search.stats().clone())
    }

    fn run_rounds(&mut self) -> Result<(), SearchError> {
        loop {
            {
                let mut tree = self.tree.lock_low();
                self.search.expand(&mut tree);
                self.search.backup(&mut tree);
                if self.stop.load(Ordering::Relaxed) || should_stop(&tree, &self.config) {
                    return Ok(());
                }
                self.search.switch_buffer();
                self.search.select(&mut tree, self.config.max_simulations);
            }

            if self.search.tasks().is_empty() {
                // other threads hold the remaining work
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            self.search.solve(self.solver.as_mut());
            self.search.schedule_to_nn(&mut self.nn);
            self.search.evaluate(&mut self.nn)?;
            self.search.generate_edges(&mut self.generator);
        }
    }
}

/// Controller for a pool of search threads.
pub struct SearchEngine {
    tree: Arc<PriorityMutex<Tree>>,
    stop: Arc<AtomicBool>,
    config: EngineConfig,
    search_config: SearchConfig,
    evaluator: Arc<dyn Evaluator>,
    handles: Vec<JoinHandle<Result<SearchStats, SearchError>>>,
}

impl SearchEngine {
    pub fn new(
        tree: Tree,
        evaluator: Arc<dyn Evaluator>,
        config: EngineConfig,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            tree: Arc::new(PriorityMutex::new(tree)),
            stop: Arc::new(AtomicBool::new(false)),
            config,
            search_config,
            evaluator,
            handles: Vec::new(),
        }
    }

    /// Shared tree, for snapshots under [`PriorityMutex::lock_high`].
    pub fn tree(&self) -> &Arc<PriorityMutex<Tree>> {
        &self.tree
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_board(&self, board: &Board, sign_to_move: Sign) -> Result<(), SearchError> {
        if self.is_running() {
            return Err(SearchError::AlreadyRunning);
        }
        self.tree.lock_high().set_board(board, sign_to_move, false);
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), SearchError> {
        self.start_with_solver(|| Box::new(NoSolver))
    }

    /// Spawn the workers, each with its own solver.
    pub fn start_with_solver<F>(&mut self, make_solver: F) -> Result<(), SearchError>
    where
        F: Fn() -> Box<dyn Solver>,
    {
        if self.is_running() {
            return Err(SearchError::AlreadyRunning);
        }
        self.handles.clear();
        self.stop.store(false, Ordering::Relaxed);

        for index in 0..self.config.num_threads.max(1) {
            let worker = SearchThread::new(
                Arc::clone(&self.tree),
                Arc::clone(&self.stop),
                self.config.clone(),
                self.search_config.clone(),
                Arc::clone(&self.evaluator),
                make_solver(),
            );
            let handle = thread::Builder::new()
                .name(format!("search-{index}"))
                .spawn(move || worker.run());
            match handle {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    self.stop();
                    // a failed spawn leaves the already running workers to be joined
                    let _ = self.join();
                    return Err(e.into());
                }
            }
        }
        info!(
            threads = self.handles.len(),
            batch = self.search_config.max_batch_size,
            "search started"
        );
        Ok(())
    }

    /// Ask the workers to finish their current round and exit.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Wait for every worker and merge their statistics. The first worker
    /// error is returned after all threads have exited.
    pub fn join(&mut self) -> Result<SearchStats, SearchError> {
        let mut stats = SearchStats::default();
        let mut first_error = None;
        for handle in self.handles.drain(..) {
            match handle.join() {
                Ok(Ok(worker_stats)) => stats.merge(&worker_stats),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(SearchError::WorkerPanicked);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Start a search and wait for it with [`wait_for`](Self::wait_for).
    pub fn search_for(&mut self, limit: Duration) -> Result<SearchStats, SearchError> {
        self.start()?;
        self.wait_for(limit)
    }

    /// Let the running workers search until `limit` elapses or a stop
    /// condition holds, then stop and join them.
    pub fn wait_for(&mut self, limit: Duration) -> Result<SearchStats, SearchError> {
        let start = Instant::now();
        while start.elapsed() < limit && self.is_running() {
            if should_stop(&self.tree.lock_high(), &self.config) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.stop();
        let stats = self.join()?;

        let tree = self.tree.lock_high();
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            simulations = tree.simulation_count(),
            nodes = tree.node_count(),
            proven = tree.is_root_proven(),
            "search finished"
        );
        debug!(%stats, "search statistics");
        Ok(stats)
    }

    /// Search with the configured time limit, or until a stop condition
    /// holds when there is none.
    pub fn run(&mut self) -> Result<SearchStats, SearchError> {
        self.search_for(self.config.time_limit.unwrap_or(Duration::MAX))
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        self.stop();
        let _ = self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::evaluator::UniformEvaluator;

    fn engine(board: &Board, sign: Sign, config: EngineConfig) -> SearchEngine {
        let search_config = SearchConfig::for_testing();
        let mut tree = Tree::new(TreeConfig::for_testing(), &search_config);
        tree.set_board(board, sign, false);
        SearchEngine::new(tree, Arc::new(UniformEvaluator::new()), config, search_config)
    }

    #[test]
    fn test_should_stop_on_budget() {
        let config = EngineConfig::for_testing().with_max_simulations(0);
        let tree = Tree::new(TreeConfig::for_testing(), &SearchConfig::for_testing());
        assert!(should_stop(&tree, &config));
        assert!(!should_stop(&tree, &EngineConfig::for_testing()));
    }

    #[test]
    fn test_single_thread_run_reaches_budget() {
        let config = EngineConfig::for_testing()
            .with_threads(1)
            .with_time_limit(None)
            .with_max_simulations(200);
        let mut engine = engine(&Board::new(9, 9), Sign::Cross, config);
        let stats = engine.run().unwrap();

        let tree = engine.tree().lock_high();
        assert_eq!(tree.simulation_count(), 200);
        assert!(stats.nb_node_count > 0);
        assert!(stats.nb_batch_rounds > 0);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_restart_is_rejected_while_running() {
        let config = EngineConfig::for_testing()
            .with_threads(2)
            .with_max_nodes(usize::MAX)
            .with_max_simulations(crate::config::MAX_NUMBER_OF_SIMULATIONS);
        let mut engine = engine(&Board::new(9, 9), Sign::Cross, config);
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(SearchError::AlreadyRunning)));
        assert!(matches!(
            engine.set_board(&Board::new(9, 9), Sign::Cross),
            Err(SearchError::AlreadyRunning)
        ));
        engine.stop();
        engine.join().unwrap();
        assert!(!engine.is_running());
    }
}
