//! MCTS benchmarks for performance profiling.
//!
//! Run with: `cargo bench -p mcts`
//!
//! These benchmarks measure:
//! - Node cache lookups and insertions on random positions
//! - Single search rounds (select, evaluate, expand, backup) by board size
//! - Batch size and thread count of the full engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gomoku_core::{Board, Move, Sign};
use mcts::{
    EngineConfig, FiveInRowSolver, NNEvaluator, NodeCache, Search, SearchConfig, SearchEngine,
    Tree, TreeConfig, UniformEvaluator,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use std::time::Duration;

/// Board with `stones` random moves played alternately from Cross.
fn random_board(rng: &mut ChaCha20Rng, size: usize, stones: usize) -> Board {
    let mut board = Board::new(size, size);
    let mut cells: Vec<(usize, usize)> = board.empty_cells().collect();
    cells.shuffle(rng);
    let mut sign = Sign::Cross;
    for &(row, col) in cells.iter().take(stones) {
        board.put_move(Move::new(row, col, sign));
        sign = sign.invert();
    }
    board
}

fn sign_to_move(board: &Board) -> Sign {
    if board.move_count() % 2 == 0 {
        Sign::Cross
    } else {
        Sign::Circle
    }
}

// =============================================================================
// Node Cache Benchmarks
// =============================================================================

fn bench_node_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_cache");
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let boards: Vec<Board> = (0..1000)
        .map(|i| random_board(&mut rng, 15, 10 + i % 20))
        .collect();

    group.throughput(Throughput::Elements(boards.len() as u64));
    group.bench_function("insert_1000", |b| {
        b.iter_batched(
            || NodeCache::new(15, 15, 2048, 256),
            |mut cache| {
                for board in &boards {
                    cache.insert(board, sign_to_move(board), 8);
                }
                black_box(cache.stored_nodes())
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("seek_1000", |b| {
        let mut cache = NodeCache::new(15, 15, 2048, 256);
        for board in &boards {
            cache.insert(board, sign_to_move(board), 8);
        }
        b.iter(|| {
            let found = boards
                .iter()
                .filter(|board| cache.seek(board, sign_to_move(board)).is_some())
                .count();
            black_box(found)
        });
    });

    group.bench_function("resize_1000", |b| {
        b.iter_batched(
            || {
                let mut cache = NodeCache::new(15, 15, 2048, 256);
                for board in &boards {
                    cache.insert(board, sign_to_move(board), 8);
                }
                cache
            },
            |mut cache| {
                cache.resize(8192);
                black_box(cache.number_of_bins())
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

// =============================================================================
// Search Round Benchmarks
// =============================================================================

fn bench_search_rounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_rounds");
    let rounds = 50u32;

    for size in [9, 15, 19] {
        group.throughput(Throughput::Elements(rounds as u64));
        group.bench_with_input(BenchmarkId::new("board", size), &size, |b, &size| {
            let search_config = SearchConfig::default().with_batch_size(8);
            b.iter(|| {
                let mut tree = Tree::new(TreeConfig::default(), &search_config);
                tree.set_board(&Board::new(size, size), Sign::Cross, false);
                let mut search = Search::new(search_config.clone(), size, size);
                let mut nn = NNEvaluator::new(Arc::new(UniformEvaluator::new()), 8);
                let mut solver = FiveInRowSolver::new();
                let mut generator = tree.edge_generator().clone();

                for _ in 0..rounds {
                    search.select(&mut tree, 1_000_000);
                    search.solve(&mut solver);
                    search.schedule_to_nn(&mut nn);
                    search.evaluate(&mut nn).unwrap();
                    search.generate_edges(&mut generator);
                    search.expand(&mut tree);
                    search.backup(&mut tree);
                }
                black_box(tree.node_count())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Engine Configuration Benchmarks
// =============================================================================

fn run_engine(threads: usize, batch: usize, simulations: u32) -> usize {
    let search_config = SearchConfig::default().with_batch_size(batch);
    let mut tree = Tree::new(TreeConfig::default(), &search_config);
    tree.set_board(&Board::new(15, 15), Sign::Cross, false);
    let config = EngineConfig::default()
        .with_threads(threads)
        .with_time_limit(None)
        .with_max_simulations(simulations);
    let mut engine = SearchEngine::new(
        tree,
        Arc::new(UniformEvaluator::new()),
        config,
        search_config,
    );
    engine.search_for(Duration::from_secs(60)).unwrap();
    let nodes = engine.tree().lock_high().node_count();
    nodes
}

fn bench_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_sizes");
    group.sample_size(20);
    let sims = 2000u32;

    for batch in [1, 4, 16, 64] {
        group.throughput(Throughput::Elements(sims as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter(|| black_box(run_engine(1, batch, sims)));
        });
    }

    group.finish();
}

fn bench_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("threads");
    group.sample_size(20);
    let sims = 4000u32;

    for threads in [1, 2, 4] {
        group.throughput(Throughput::Elements(sims as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter(|| black_box(run_engine(threads, 16, sims)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_node_cache,
    bench_search_rounds,
    bench_batch_sizes,
    bench_threads,
);

criterion_main!(benches);
