//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_rows() -> usize {
    defaults::rows()
}
fn d_cols() -> usize {
    defaults::cols()
}
fn d_cache_size() -> usize {
    defaults::initial_cache_size()
}
fn d_block_size() -> usize {
    defaults::node_block_size()
}
fn d_leak_threshold() -> f64 {
    defaults::information_leak_threshold()
}
fn d_batch_size() -> usize {
    defaults::max_batch_size()
}
fn d_exploration() -> f64 {
    defaults::exploration_constant()
}
fn d_style_factor() -> f64 {
    defaults::style_factor()
}
fn d_prior_threshold() -> f64 {
    defaults::expansion_prior_threshold()
}
fn d_max_children() -> usize {
    defaults::max_children()
}
fn d_force_expand_root() -> bool {
    defaults::force_expand_root()
}
fn d_noise_weight() -> f64 {
    defaults::noise_weight()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_balance_depth() -> usize {
    defaults::balance_depth()
}
fn d_center_square() -> usize {
    defaults::center_square()
}
fn d_selector() -> String {
    defaults::selector().into()
}
fn d_generator() -> String {
    defaults::generator().into()
}
fn d_num_threads() -> usize {
    defaults::num_threads()
}
fn d_time_limit() -> u64 {
    defaults::time_limit_ms()
}
fn d_max_nodes() -> usize {
    defaults::max_nodes()
}
fn d_max_depth() -> usize {
    defaults::max_depth()
}
fn d_max_sims() -> u32 {
    defaults::max_simulations()
}
fn d_single_move() -> bool {
    defaults::stop_on_single_move()
}
fn d_eval_batch_size() -> usize {
    defaults::eval_batch_size()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub tree: TreeSection,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub engine: EngineSection,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Board dimensions of the analysed position
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoardConfig {
    #[serde(default = "d_rows")]
    pub rows: usize,
    #[serde(default = "d_cols")]
    pub cols: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: defaults::rows(),
            cols: defaults::cols(),
        }
    }
}

/// Shared tree and node cache
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TreeSection {
    /// Initial number of hash buckets
    #[serde(default = "d_cache_size")]
    pub initial_cache_size: usize,
    /// Entries allocated together in one arena block
    #[serde(default = "d_block_size")]
    pub node_block_size: usize,
    #[serde(default = "d_leak_threshold")]
    pub information_leak_threshold: f64,
}

impl Default for TreeSection {
    fn default() -> Self {
        Self {
            initial_cache_size: defaults::initial_cache_size(),
            node_block_size: defaults::node_block_size(),
            information_leak_threshold: defaults::information_leak_threshold(),
        }
    }
}

/// Batched search of one worker
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSection {
    #[serde(default = "d_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "d_exploration")]
    pub exploration_constant: f64,
    /// Weight of a draw relative to a win
    #[serde(default = "d_style_factor")]
    pub style_factor: f64,
    #[serde(default = "d_prior_threshold")]
    pub expansion_prior_threshold: f64,
    #[serde(default = "d_max_children")]
    pub max_children: usize,
    #[serde(default = "d_force_expand_root")]
    pub force_expand_root: bool,
    /// Dirichlet noise mixed into root priors. Zero disables noise.
    #[serde(default = "d_noise_weight")]
    pub noise_weight: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_balance_depth")]
    pub balance_depth: usize,
    #[serde(default = "d_center_square")]
    pub center_square: usize,
    /// One of "puct", "uct", "noisy_puct", "balanced"
    #[serde(default = "d_selector")]
    pub selector: String,
    /// One of "base", "solver_aware", "balanced", "center_excluding",
    /// "center_only", "symmetry_excluding", "noisy"
    #[serde(default = "d_generator")]
    pub generator: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_batch_size: defaults::max_batch_size(),
            exploration_constant: defaults::exploration_constant(),
            style_factor: defaults::style_factor(),
            expansion_prior_threshold: defaults::expansion_prior_threshold(),
            max_children: defaults::max_children(),
            force_expand_root: defaults::force_expand_root(),
            noise_weight: defaults::noise_weight(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            balance_depth: defaults::balance_depth(),
            center_square: defaults::center_square(),
            selector: defaults::selector().into(),
            generator: defaults::generator().into(),
        }
    }
}

/// Limits and thread count of a whole engine run
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineSection {
    #[serde(default = "d_num_threads")]
    pub num_threads: usize,
    /// Zero means no time limit
    #[serde(default = "d_time_limit")]
    pub time_limit_ms: u64,
    #[serde(default = "d_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "d_max_depth")]
    pub max_depth: usize,
    #[serde(default = "d_max_sims")]
    pub max_simulations: u32,
    #[serde(default = "d_single_move")]
    pub stop_on_single_move: bool,
    #[serde(default = "d_eval_batch_size")]
    pub eval_batch_size: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            num_threads: defaults::num_threads(),
            time_limit_ms: defaults::time_limit_ms(),
            max_nodes: defaults::max_nodes(),
            max_depth: defaults::max_depth(),
            max_simulations: defaults::max_simulations(),
            stop_on_single_move: defaults::stop_on_single_move(),
            eval_batch_size: defaults::eval_batch_size(),
        }
    }
}
