//! Search configuration parameters.

use std::time::Duration;

/// Upper bound on root visits for any single search.
pub const MAX_NUMBER_OF_SIMULATIONS: u32 = 16_777_216;

/// Configuration of the shared tree and its node cache.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Initial number of hash buckets (rounded up to a power of two).
    pub initial_cache_size: usize,

    /// Number of entries allocated together in one arena block.
    pub node_block_size: usize,

    /// Minimum value mismatch between an edge and its child that counts as an
    /// information leak.
    pub information_leak_threshold: f32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            initial_cache_size: 1 << 20,
            node_block_size: 10_000,
            information_leak_threshold: 0.01,
        }
    }
}

impl TreeConfig {
    /// Small cache for tests.
    pub fn for_testing() -> Self {
        Self {
            initial_cache_size: 1024,
            node_block_size: 256,
            information_leak_threshold: 0.01,
        }
    }

    pub fn with_cache_size(mut self, bins: usize) -> Self {
        self.initial_cache_size = bins;
        self
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.node_block_size = size;
        self
    }
}

/// Which edge selection formula to use during tree descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Puct,
    Uct,
    NoisyPuct,
    Balanced,
}

impl SelectorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "puct" => Some(SelectorKind::Puct),
            "uct" => Some(SelectorKind::Uct),
            "noisy_puct" => Some(SelectorKind::NoisyPuct),
            "balanced" => Some(SelectorKind::Balanced),
            _ => None,
        }
    }
}

/// Which edge generation strategy to use on expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Base,
    SolverAware,
    Balanced,
    CenterExcluding,
    CenterOnly,
    SymmetryExcluding,
    Noisy,
}

impl GeneratorKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "base" => Some(GeneratorKind::Base),
            "solver_aware" => Some(GeneratorKind::SolverAware),
            "balanced" => Some(GeneratorKind::Balanced),
            "center_excluding" => Some(GeneratorKind::CenterExcluding),
            "center_only" => Some(GeneratorKind::CenterOnly),
            "symmetry_excluding" => Some(GeneratorKind::SymmetryExcluding),
            "noisy" => Some(GeneratorKind::Noisy),
            _ => None,
        }
    }
}

/// Configuration of one worker's batched search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum number of tasks selected per round.
    pub max_batch_size: usize,

    /// Exploration constant of the PUCT / UCT formula.
    pub exploration_constant: f32,

    /// Weight of a draw relative to a win when computing expectations.
    pub style_factor: f32,

    /// Priors below this fraction (after keeping the top moves) are pruned.
    pub expansion_prior_threshold: f32,

    /// Maximum number of edges created per node.
    pub max_children: usize,

    /// Skip pruning at the root so every legal move gets an edge.
    pub force_expand_root: bool,

    /// Weight of Dirichlet noise mixed into root priors. Zero disables noise.
    pub noise_weight: f32,

    /// Dirichlet concentration for root noise.
    pub dirichlet_alpha: f32,

    /// Depth below which balanced selector/generator variants apply.
    pub balance_depth: usize,

    /// Side of the central square used by center-only/excluding generators.
    pub center_square: usize,

    pub selector: SelectorKind,
    pub generator: GeneratorKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 256,
            exploration_constant: 1.25,
            style_factor: 0.5,
            expansion_prior_threshold: 0.0,
            max_children: i32::MAX as usize,
            force_expand_root: false,
            noise_weight: 0.0,
            dirichlet_alpha: 0.3,
            balance_depth: 0,
            center_square: 5,
            selector: SelectorKind::Puct,
            generator: GeneratorKind::Base,
        }
    }
}

impl SearchConfig {
    /// Small batches for tests.
    pub fn for_testing() -> Self {
        Self {
            max_batch_size: 8,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_exploration_constant(mut self, c: f32) -> Self {
        self.exploration_constant = c;
        self
    }

    pub fn with_max_children(mut self, n: usize) -> Self {
        self.max_children = n;
        self
    }

    pub fn with_noise(mut self, weight: f32, alpha: f32) -> Self {
        self.noise_weight = weight;
        self.dirichlet_alpha = alpha;
        self
    }

    pub fn with_selector(mut self, selector: SelectorKind) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_generator(mut self, generator: GeneratorKind) -> Self {
        self.generator = generator;
        self
    }
}

/// Limits and thread count for a whole engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub num_threads: usize,
    pub time_limit: Option<Duration>,
    pub max_nodes: usize,
    pub max_depth: usize,
    pub max_simulations: u32,
    /// Stop once the root has only one move that does not lose.
    pub stop_on_single_move: bool,
    /// Evaluator batch size used by each worker.
    pub eval_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: 1,
            time_limit: Some(Duration::from_secs(5)),
            max_nodes: 1_000_000,
            max_depth: 225,
            max_simulations: MAX_NUMBER_OF_SIMULATIONS,
            stop_on_single_move: true,
            eval_batch_size: 32,
        }
    }
}

impl EngineConfig {
    pub fn for_testing() -> Self {
        Self {
            num_threads: 2,
            time_limit: Some(Duration::from_millis(200)),
            max_nodes: 2_000,
            max_depth: 64,
            max_simulations: 500,
            stop_on_single_move: false,
            eval_batch_size: 8,
        }
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.num_threads = n;
        self
    }

    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_max_nodes(mut self, n: usize) -> Self {
        self.max_nodes = n;
        self
    }

    pub fn with_max_simulations(mut self, n: u32) -> Self {
        self.max_simulations = n.min(MAX_NUMBER_OF_SIMULATIONS);
        self
    }
}
