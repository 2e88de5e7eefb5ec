//! Concurrent Monte Carlo Tree Search for Gomoku.
//!
//! This crate provides the search core of the engine: a shared search graph
//! with a transposition cache, batched search rounds driven by worker
//! threads, and exact scores mixed with statistical estimates.
//!
//! # Overview
//!
//! Each search round a worker:
//!
//! 1. **Selects** a batch of leaves, walking the tree with an
//!    [`EdgeSelector`] and adding virtual loss so concurrent walks spread out
//! 2. **Solves** what it can exactly with a [`Solver`]
//! 3. **Evaluates** the rest in one batch with an [`Evaluator`], outside the
//!    tree lock
//! 4. **Expands** the leaves into nodes, with edges built by an
//!    [`EdgeGenerator`]
//! 5. **Backs up** values and proven scores along every path
//!
//! Positions reached by different move orders share one [`Node`] in the
//! [`NodeCache`]. Nodes are addressed by generation-checked [`NodeId`]
//! handles, so a handle that outlives a cleanup is detected rather than
//! aliased.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gomoku_core::{Board, Sign};
//! use mcts::{EngineConfig, SearchConfig, SearchEngine, Tree, TreeConfig, UniformEvaluator};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let search_config = SearchConfig::default();
//! let mut tree = Tree::new(TreeConfig::default(), &search_config);
//! tree.set_board(&Board::new(15, 15), Sign::Cross, false);
//!
//! let mut engine = SearchEngine::new(
//!     tree,
//!     Arc::new(UniformEvaluator::new()),
//!     EngineConfig::default().with_threads(4),
//!     search_config,
//! );
//! let stats = engine.search_for(Duration::from_secs(1)).unwrap();
//!
//! let tree = engine.tree().lock_high();
//! println!("{:?}", tree.get_principal_variation());
//! println!("{}", stats);
//! ```
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                        SearchEngine                         |
//! |   stop flag, polls stop conditions under lock_high()        |
//! +------------------------------+------------------------------+
//!                                |
//!          +---------------------+---------------------+
//!          v                                           v
//! +------------------+                        +------------------+
//! |  SearchThread 0  |          ...           |  SearchThread N  |
//! |  Search (2 bufs) |                        |  Search (2 bufs) |
//! |  NNEvaluator     |                        |  NNEvaluator     |
//! |  Solver          |                        |  Solver          |
//! +--------+---------+                        +---------+--------+
//!          |            lock_low() per round            |
//!          +---------------------+----------------------+
//!                                v
//!               +-----------------------------------+
//!               |   PriorityMutex<Tree>             |
//!               |   Tree -> NodeCache -> Node/Edge  |
//!               +-----------------------------------+
//! ```

pub mod config;
pub mod edge;
pub mod edge_generator;
pub mod edge_selector;
pub mod evaluator;
pub mod nn_evaluator;
pub mod node;
pub mod node_cache;
pub mod priority_mutex;
pub mod score;
pub mod search;
pub mod search_task;
pub mod solver;
pub mod stats;
pub mod tree;
pub mod value;
pub mod worker;

// Re-export main types
pub use config::{
    EngineConfig, GeneratorKind, SearchConfig, SelectorKind, TreeConfig,
    MAX_NUMBER_OF_SIMULATIONS,
};
pub use edge::Edge;
pub use edge_generator::EdgeGenerator;
pub use edge_selector::EdgeSelector;
pub use evaluator::{EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use nn_evaluator::{NNEvaluator, NNEvaluatorStats};
pub use node::{Node, NodeId};
pub use node_cache::{NodeCache, NodeCacheStats};
pub use priority_mutex::{PriorityGuard, PriorityMutex};
pub use score::{ProvenValue, Score};
pub use search::{Search, SearchError};
pub use search_task::{NodeEdgePair, SearchTask, SearchTaskList, TaskState};
pub use solver::{FiveInRowSolver, NoSolver, Solver};
pub use stats::{SearchStats, TimedStat};
pub use tree::{ExpandOutcome, SelectOutcome, Tree, VariationStep};
pub use value::Value;
pub use worker::{should_stop, SearchEngine, SearchThread};
