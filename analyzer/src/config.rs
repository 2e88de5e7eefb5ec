//! Command-line configuration of the analyzer.
//!
//! Configuration is loaded from config.toml with environment variable
//! overrides. CLI arguments take highest priority.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use gomoku_core::{Board, Move, Sign};
use mcts::{EngineConfig, GeneratorKind, SearchConfig, SelectorKind, TreeConfig};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::time::Duration;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}
fn default_rows() -> usize {
    CENTRAL_CONFIG.board.rows
}
fn default_cols() -> usize {
    CENTRAL_CONFIG.board.cols
}
fn default_threads() -> usize {
    CENTRAL_CONFIG.engine.num_threads
}
fn default_time_limit() -> u64 {
    CENTRAL_CONFIG.engine.time_limit_ms
}
fn default_max_simulations() -> u32 {
    CENTRAL_CONFIG.engine.max_simulations
}
fn default_batch_size() -> usize {
    CENTRAL_CONFIG.search.max_batch_size
}
fn default_selector() -> String {
    CENTRAL_CONFIG.search.selector.clone()
}
fn default_generator() -> String {
    CENTRAL_CONFIG.search.generator.clone()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "analyzer")]
#[command(about = "Analyze a Gomoku position with the multi-threaded tree search")]
#[command(
    long_about = "Runs a timed search on one position and prints the principal
variation, the playout distribution, the top of the tree and search statistics.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Args {
    /// File with the board text ('X', 'O' and '_' per cell, one row per line)
    #[arg(long, conflicts_with = "moves")]
    pub board: Option<PathBuf>,

    /// Moves played from an empty board, e.g. "7,7 7,8 8,8" (Cross first)
    #[arg(long)]
    pub moves: Option<String>,

    /// Side to move ('X' or 'O'); inferred from the stone count when omitted
    #[arg(long)]
    pub sign: Option<char>,

    /// Board rows when no board file is given
    #[arg(long, default_value_t = default_rows())]
    pub rows: usize,

    /// Board columns when no board file is given
    #[arg(long, default_value_t = default_cols())]
    pub cols: usize,

    /// Number of search threads
    #[arg(long, default_value_t = default_threads())]
    pub threads: usize,

    /// Search time in milliseconds (0 searches until another limit is reached)
    #[arg(long, default_value_t = default_time_limit())]
    pub time_limit_ms: u64,

    /// Maximum number of root visits
    #[arg(long, default_value_t = default_max_simulations())]
    pub max_simulations: u32,

    /// Tasks selected per batch round
    #[arg(long, default_value_t = default_batch_size())]
    pub batch_size: usize,

    /// Edge selector (puct, uct, noisy_puct, balanced)
    #[arg(long, default_value_t = default_selector())]
    pub selector: String,

    /// Edge generator (base, solver_aware, balanced, center_excluding,
    /// center_only, symmetry_excluding, noisy)
    #[arg(long, default_value_t = default_generator())]
    pub generator: String,

    /// Disable the five-in-a-row solver
    #[arg(long)]
    pub no_solver: bool,

    /// Depth of the printed tree summary
    #[arg(long, default_value_t = 1)]
    pub tree_depth: usize,

    /// Edges printed per node in the tree summary
    #[arg(long, default_value_t = 10)]
    pub tree_edges: usize,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            bail!("threads must be at least 1");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.time_limit_ms == 0 && self.max_simulations == 0 {
            bail!("either time_limit_ms or max_simulations must be positive");
        }
        self.selector_kind()?;
        self.generator_kind()?;
        Ok(())
    }

    fn selector_kind(&self) -> Result<SelectorKind> {
        SelectorKind::parse(&self.selector)
            .ok_or_else(|| anyhow!("unknown selector '{}'", self.selector))
    }

    fn generator_kind(&self) -> Result<GeneratorKind> {
        GeneratorKind::parse(&self.generator)
            .ok_or_else(|| anyhow!("unknown generator '{}'", self.generator))
    }

    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }

    pub fn tree_config(&self) -> TreeConfig {
        let tree = &CENTRAL_CONFIG.tree;
        TreeConfig {
            initial_cache_size: tree.initial_cache_size,
            node_block_size: tree.node_block_size,
            information_leak_threshold: tree.information_leak_threshold as f32,
        }
    }

    pub fn search_config(&self) -> Result<SearchConfig> {
        let search = &CENTRAL_CONFIG.search;
        Ok(SearchConfig {
            max_batch_size: self.batch_size,
            exploration_constant: search.exploration_constant as f32,
            style_factor: search.style_factor as f32,
            expansion_prior_threshold: search.expansion_prior_threshold as f32,
            max_children: search.max_children,
            force_expand_root: search.force_expand_root,
            noise_weight: search.noise_weight as f32,
            dirichlet_alpha: search.dirichlet_alpha as f32,
            balance_depth: search.balance_depth,
            center_square: search.center_square,
            selector: self.selector_kind()?,
            generator: self.generator_kind()?,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        let engine = &CENTRAL_CONFIG.engine;
        EngineConfig {
            num_threads: self.threads,
            time_limit: self.time_limit(),
            max_nodes: engine.max_nodes,
            max_depth: engine.max_depth,
            max_simulations: engine.max_simulations,
            stop_on_single_move: engine.stop_on_single_move,
            eval_batch_size: engine.eval_batch_size,
        }
        .with_max_simulations(self.max_simulations)
    }

    /// The analysed position and the side to move.
    pub fn position(&self) -> Result<(Board, Sign)> {
        let board = match (&self.board, &self.moves) {
            (Some(path), _) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read board from {}", path.display()))?;
                text.parse::<Board>()
                    .with_context(|| format!("failed to parse board in {}", path.display()))?
            }
            (None, Some(moves)) => parse_moves(self.rows, self.cols, moves)?,
            (None, None) => Board::try_new(self.rows, self.cols)?,
        };

        let sign = match self.sign {
            Some(c) => match Sign::from_char(c) {
                Some(sign) if sign != Sign::None => sign,
                _ => bail!("invalid side to move '{}'", c),
            },
            None => infer_sign_to_move(&board),
        };
        Ok((board, sign))
    }
}

/// Cross moves first, so it is to move whenever the stone counts are equal.
pub fn infer_sign_to_move(board: &Board) -> Sign {
    let crosses = board.cells().iter().filter(|&&s| s == Sign::Cross).count();
    let circles = board.cells().iter().filter(|&&s| s == Sign::Circle).count();
    if crosses > circles {
        Sign::Circle
    } else {
        Sign::Cross
    }
}

/// Play "row,col" pairs separated by whitespace, alternating from Cross.
pub fn parse_moves(rows: usize, cols: usize, text: &str) -> Result<Board> {
    let mut board = Board::try_new(rows, cols)?;
    let mut sign = Sign::Cross;
    for token in text.split_whitespace() {
        let (row, col) = token
            .split_once(',')
            .ok_or_else(|| anyhow!("expected row,col but got '{}'", token))?;
        let row: usize = row
            .trim()
            .parse()
            .with_context(|| format!("invalid row in '{}'", token))?;
        let col: usize = col
            .trim()
            .parse()
            .with_context(|| format!("invalid column in '{}'", token))?;
        board.try_put_move(Move::new(row, col, sign))?;
        sign = sign.invert();
    }
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["analyzer"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parse_moves_alternates_signs() {
        let board = parse_moves(15, 15, "7,7 7,8  8,8").unwrap();
        assert_eq!(board.get(7, 7), Sign::Cross);
        assert_eq!(board.get(7, 8), Sign::Circle);
        assert_eq!(board.get(8, 8), Sign::Cross);
        assert_eq!(infer_sign_to_move(&board), Sign::Circle);
    }

    #[test]
    fn parse_moves_rejects_bad_input() {
        assert!(parse_moves(15, 15, "7;7").is_err());
        assert!(parse_moves(15, 15, "7,x").is_err());
        assert!(parse_moves(15, 15, "20,0").is_err());
        assert!(parse_moves(15, 15, "7,7 7,7").is_err());
    }

    #[test]
    fn explicit_sign_wins_over_inference() {
        let args = args(&["--rows", "9", "--cols", "9", "--sign", "O"]);
        let (board, sign) = args.position().unwrap();
        assert_eq!(board.rows(), 9);
        assert_eq!(sign, Sign::Circle);
    }

    #[test]
    fn unknown_selector_fails_validation() {
        assert!(args(&["--selector", "greedy"]).validate().is_err());
        assert!(args(&["--selector", "uct"]).validate().is_ok());
    }

    #[test]
    fn zero_time_limit_means_unlimited() {
        let args = args(&["--time-limit-ms", "0", "--max-simulations", "100"]);
        let config = args.engine_config();
        assert!(config.time_limit.is_none());
        assert_eq!(config.max_simulations, 100);
    }
}
