//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file is embedded at compile time, so a binary runs with the
//! same defaults wherever it is started from.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    board: BoardDefaults,
    tree: TreeDefaults,
    search: SearchDefaults,
    engine: EngineDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct BoardDefaults {
    rows: usize,
    cols: usize,
}

#[derive(Debug, Deserialize)]
struct TreeDefaults {
    initial_cache_size: usize,
    node_block_size: usize,
    information_leak_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    max_batch_size: usize,
    exploration_constant: f64,
    style_factor: f64,
    expansion_prior_threshold: f64,
    max_children: usize,
    force_expand_root: bool,
    noise_weight: f64,
    dirichlet_alpha: f64,
    balance_depth: usize,
    center_square: usize,
    selector: String,
    generator: String,
}

#[derive(Debug, Deserialize)]
struct EngineDefaults {
    num_threads: usize,
    time_limit_ms: u64,
    max_nodes: usize,
    max_depth: usize,
    max_simulations: u32,
    stop_on_single_move: bool,
    eval_batch_size: usize,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Board
pub fn rows() -> usize {
    DEFAULTS.board.rows
}
pub fn cols() -> usize {
    DEFAULTS.board.cols
}

// Tree
pub fn initial_cache_size() -> usize {
    DEFAULTS.tree.initial_cache_size
}
pub fn node_block_size() -> usize {
    DEFAULTS.tree.node_block_size
}
pub fn information_leak_threshold() -> f64 {
    DEFAULTS.tree.information_leak_threshold
}

// Search
pub fn max_batch_size() -> usize {
    DEFAULTS.search.max_batch_size
}
pub fn exploration_constant() -> f64 {
    DEFAULTS.search.exploration_constant
}
pub fn style_factor() -> f64 {
    DEFAULTS.search.style_factor
}
pub fn expansion_prior_threshold() -> f64 {
    DEFAULTS.search.expansion_prior_threshold
}
pub fn max_children() -> usize {
    DEFAULTS.search.max_children
}
pub fn force_expand_root() -> bool {
    DEFAULTS.search.force_expand_root
}
pub fn noise_weight() -> f64 {
    DEFAULTS.search.noise_weight
}
pub fn dirichlet_alpha() -> f64 {
    DEFAULTS.search.dirichlet_alpha
}
pub fn balance_depth() -> usize {
    DEFAULTS.search.balance_depth
}
pub fn center_square() -> usize {
    DEFAULTS.search.center_square
}
pub fn selector() -> &'static str {
    &DEFAULTS.search.selector
}
pub fn generator() -> &'static str {
    &DEFAULTS.search.generator
}

// Engine
pub fn num_threads() -> usize {
    DEFAULTS.engine.num_threads
}
pub fn time_limit_ms() -> u64 {
    DEFAULTS.engine.time_limit_ms
}
pub fn max_nodes() -> usize {
    DEFAULTS.engine.max_nodes
}
pub fn max_depth() -> usize {
    DEFAULTS.engine.max_depth
}
pub fn max_simulations() -> u32 {
    DEFAULTS.engine.max_simulations
}
pub fn stop_on_single_move() -> bool {
    DEFAULTS.engine.stop_on_single_move
}
pub fn eval_batch_size() -> usize {
    DEFAULTS.engine.eval_batch_size
}
