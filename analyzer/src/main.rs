//! Analyzer - position analysis with the multi-threaded tree search
//!
//! A one-shot process that:
//! 1. Loads config.toml (with env overrides) and the command-line arguments
//! 2. Builds the position from a board file or a move list
//! 3. Runs a timed search with a uniform evaluator and the five-in-a-row solver
//! 4. Prints the principal variation, playout distribution, tree and statistics

use anyhow::{Context, Result};
use clap::Parser;
use mcts::{FiveInRowSolver, NoSolver, SearchEngine, Solver, Tree, UniformEvaluator};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod config;
mod report;

use crate::config::Args;
use crate::report::Report;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    init_tracing(&args.log_level)?;

    let (board, sign) = args.position()?;
    let search_config = args.search_config()?;
    let engine_config = args.engine_config();
    info!(
        rows = board.rows(),
        cols = board.cols(),
        stones = board.move_count(),
        sign = %sign,
        threads = engine_config.num_threads,
        "Analyzing position"
    );

    let mut tree = Tree::new(args.tree_config(), &search_config);
    tree.set_board(&board, sign, false);

    let limit = engine_config.time_limit.unwrap_or(Duration::MAX);
    let mut engine = SearchEngine::new(
        tree,
        Arc::new(UniformEvaluator::new()),
        engine_config,
        search_config,
    );
    if args.no_solver {
        engine.start_with_solver(|| Box::new(NoSolver) as Box<dyn Solver>)
    } else {
        engine.start_with_solver(|| Box::new(FiveInRowSolver::new()) as Box<dyn Solver>)
    }
    .context("failed to start search threads")?;
    let stats = engine.wait_for(limit).context("search failed")?;

    let report = {
        let tree = engine.tree().lock_high();
        Report::collect(&tree, stats, args.tree_depth, args.tree_edges)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
