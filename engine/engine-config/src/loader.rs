//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from a crate directory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by the GOMOKU_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("GOMOKU_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from GOMOKU_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "GOMOKU_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = Path::new(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path. Unreadable or malformed files
/// fall back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (usize, u32, f64, bool)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        match std::env::var($key).map(|s| s.parse()) {
            Ok(Ok(v)) => $config.$section.$field = v,
            Ok(Err(_)) => warn!("Ignoring unparseable {}", $key),
            Err(_) => {}
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: GOMOKU_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "GOMOKU_COMMON_LOG_LEVEL");

    // Board
    env_override!(config, board.rows, "GOMOKU_BOARD_ROWS", parse);
    env_override!(config, board.cols, "GOMOKU_BOARD_COLS", parse);

    // Tree
    env_override!(
        config,
        tree.initial_cache_size,
        "GOMOKU_TREE_INITIAL_CACHE_SIZE",
        parse
    );
    env_override!(
        config,
        tree.node_block_size,
        "GOMOKU_TREE_NODE_BLOCK_SIZE",
        parse
    );
    env_override!(
        config,
        tree.information_leak_threshold,
        "GOMOKU_TREE_INFORMATION_LEAK_THRESHOLD",
        parse
    );

    // Search
    env_override!(
        config,
        search.max_batch_size,
        "GOMOKU_SEARCH_MAX_BATCH_SIZE",
        parse
    );
    env_override!(
        config,
        search.exploration_constant,
        "GOMOKU_SEARCH_EXPLORATION_CONSTANT",
        parse
    );
    env_override!(
        config,
        search.style_factor,
        "GOMOKU_SEARCH_STYLE_FACTOR",
        parse
    );
    env_override!(
        config,
        search.expansion_prior_threshold,
        "GOMOKU_SEARCH_EXPANSION_PRIOR_THRESHOLD",
        parse
    );
    env_override!(
        config,
        search.max_children,
        "GOMOKU_SEARCH_MAX_CHILDREN",
        parse
    );
    env_override!(
        config,
        search.force_expand_root,
        "GOMOKU_SEARCH_FORCE_EXPAND_ROOT",
        parse
    );
    env_override!(
        config,
        search.noise_weight,
        "GOMOKU_SEARCH_NOISE_WEIGHT",
        parse
    );
    env_override!(
        config,
        search.dirichlet_alpha,
        "GOMOKU_SEARCH_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        search.balance_depth,
        "GOMOKU_SEARCH_BALANCE_DEPTH",
        parse
    );
    env_override!(
        config,
        search.center_square,
        "GOMOKU_SEARCH_CENTER_SQUARE",
        parse
    );
    env_override!(config, search.selector, "GOMOKU_SEARCH_SELECTOR");
    env_override!(config, search.generator, "GOMOKU_SEARCH_GENERATOR");

    // Engine
    env_override!(
        config,
        engine.num_threads,
        "GOMOKU_ENGINE_NUM_THREADS",
        parse
    );
    env_override!(
        config,
        engine.time_limit_ms,
        "GOMOKU_ENGINE_TIME_LIMIT_MS",
        parse
    );
    env_override!(config, engine.max_nodes, "GOMOKU_ENGINE_MAX_NODES", parse);
    env_override!(config, engine.max_depth, "GOMOKU_ENGINE_MAX_DEPTH", parse);
    env_override!(
        config,
        engine.max_simulations,
        "GOMOKU_ENGINE_MAX_SIMULATIONS",
        parse
    );
    env_override!(
        config,
        engine.stop_on_single_move,
        "GOMOKU_ENGINE_STOP_ON_SINGLE_MOVE",
        parse
    );
    env_override!(
        config,
        engine.eval_batch_size,
        "GOMOKU_ENGINE_EVAL_BATCH_SIZE",
        parse
    );

    config
}
