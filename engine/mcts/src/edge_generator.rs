//! Turning evaluated tasks into concrete edges.
//!
//! A generator decides which moves of a leaf get edges, copies the policy,
//! action values and proven action scores onto them, prunes weak moves and
//! renormalises the priors of what is left.

use crate::config::{GeneratorKind, SearchConfig};
use crate::edge::Edge;
use crate::edge_selector::dirichlet_noise;
use crate::score::Score;
use crate::search_task::SearchTask;
use crate::value::Value;
use gomoku_core::{Move, Symmetry};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::cmp::Ordering;

/// Scale priors to sum to one, or spread them evenly when they sum to zero.
pub fn renormalize_policy(edges: &mut [Edge]) {
    if edges.is_empty() {
        return;
    }
    let sum: f32 = edges.iter().map(|e| e.policy_prior()).sum();
    if sum == 0.0 {
        let uniform = 1.0 / edges.len() as f32;
        for edge in edges.iter_mut() {
            edge.set_policy_prior(uniform);
        }
    } else {
        let scale = 1.0 / sum;
        for edge in edges.iter_mut() {
            edge.set_policy_prior(edge.policy_prior() * scale);
        }
    }
}

/// Drop edges that are not worth expanding.
///
/// A proven task keeps only the edges carrying its best score, or none when
/// no edge carries a proof. Otherwise the
/// `max_edges` highest priors are kept, minus those below
/// `expansion_threshold` times the prior mass that survived. Forced defences
/// are never pruned.
pub fn prune_weak_moves(task: &mut SearchTask, max_edges: usize, expansion_threshold: f32) {
    let proven = task.score().is_proven();
    let must_defend = task.must_defend();
    let edges = task.edges_mut();

    if proven {
        let best = edges
            .iter()
            .map(|e| e.score())
            .fold(Score::loss(), |a, b| a.max(b));
        if best.is_proven() {
            edges.retain(|e| e.score() == best);
        } else {
            // terminal position, the proof is not carried by any move
            edges.clear();
        }
        return;
    }
    if edges.len() <= max_edges || must_defend {
        return;
    }

    edges.sort_by(|lhs, rhs| {
        rhs.policy_prior()
            .partial_cmp(&lhs.policy_prior())
            .unwrap_or(Ordering::Equal)
    });
    edges.truncate(max_edges);
    let threshold = expansion_threshold * edges.iter().map(|e| e.policy_prior()).sum::<f32>();
    let keep = edges
        .iter()
        .take_while(|e| e.policy_prior() >= threshold)
        .count()
        .max(1);
    edges.truncate(keep);
}

/// Copy prior, value and proven score from the task matrices.
fn initialize_edges(task: &mut SearchTask) {
    let cols = task.board().cols();
    for i in 0..task.edges().len() {
        let mv = task.edges()[i].get_move();
        let index = mv.row() * cols + mv.col();
        let prior = task.policy()[index];
        let value = task.action_values()[index];
        let score = task.action_scores()[index];

        let edge = &mut task.edges_mut()[i];
        edge.set_policy_prior(prior);
        edge.set_value(value);
        edge.set_score(score);
    }
}

fn add_empty_cells(task: &mut SearchTask, filter: impl Fn(usize, usize) -> bool) {
    let sign = task.sign_to_move();
    let moves: Vec<Move> = task
        .board()
        .empty_cells()
        .filter(|&(row, col)| filter(row, col))
        .map(|(row, col)| Move::new(row, col, sign))
        .collect();
    for mv in moves {
        task.add_edge(mv);
    }
}

/// A leaf without moves and without a proof is a full board.
fn finish(task: &mut SearchTask) {
    renormalize_policy(task.edges_mut());
    if task.edges().is_empty() && !task.score().is_proven() {
        task.set_score(Score::draw());
        task.set_value(Value::draw());
    }
}

fn is_in_center_square(rows: usize, cols: usize, size: usize, row: usize, col: usize) -> bool {
    let top = (rows / 2).saturating_sub(size / 2);
    let left = (cols / 2).saturating_sub(size / 2);
    (top..top + size).contains(&row) && (left..left + size).contains(&col)
}

#[derive(Debug, Clone)]
pub enum EdgeGenerator {
    /// All empty cells, or only the forced defences when the solver found
    /// some.
    Base {
        max_edges: usize,
        expansion_threshold: f32,
        force_expand_root: bool,
    },
    /// Like `Base`, but any edges the solver supplied replace the full move
    /// list even without a forced defence.
    SolverAware {
        max_edges: usize,
        expansion_threshold: f32,
        force_expand_root: bool,
    },
    /// Unpruned expansion for positions with fewer than `balance_depth`
    /// stones.
    Balanced {
        balance_depth: usize,
        base: Box<EdgeGenerator>,
    },
    /// At the search root, moves inside the central square are excluded.
    CenterExcluding {
        square_size: usize,
        base: Box<EdgeGenerator>,
    },
    /// At the search root, only moves inside the central square.
    CenterOnly {
        square_size: usize,
        base: Box<EdgeGenerator>,
    },
    /// At the search root, one move per symmetry class of the position.
    SymmetryExcluding { base: Box<EdgeGenerator> },
    /// Dirichlet noise mixed into the root priors.
    Noisy {
        noise_weight: f32,
        dirichlet_alpha: f32,
        rng: ChaCha20Rng,
        base: Box<EdgeGenerator>,
    },
}

impl EdgeGenerator {
    pub fn from_config(config: &SearchConfig) -> Self {
        let base = EdgeGenerator::Base {
            max_edges: config.max_children,
            expansion_threshold: config.expansion_prior_threshold,
            force_expand_root: config.force_expand_root,
        };
        match config.generator {
            GeneratorKind::Base => base,
            GeneratorKind::SolverAware => EdgeGenerator::SolverAware {
                max_edges: config.max_children,
                expansion_threshold: config.expansion_prior_threshold,
                force_expand_root: config.force_expand_root,
            },
            GeneratorKind::Balanced => EdgeGenerator::Balanced {
                balance_depth: config.balance_depth,
                base: Box::new(base),
            },
            GeneratorKind::CenterExcluding => EdgeGenerator::CenterExcluding {
                square_size: config.center_square,
                base: Box::new(base),
            },
            GeneratorKind::CenterOnly => EdgeGenerator::CenterOnly {
                square_size: config.center_square,
                base: Box::new(base),
            },
            GeneratorKind::SymmetryExcluding => EdgeGenerator::SymmetryExcluding {
                base: Box::new(base),
            },
            GeneratorKind::Noisy => EdgeGenerator::Noisy {
                noise_weight: config.noise_weight,
                dirichlet_alpha: config.dirichlet_alpha,
                rng: ChaCha20Rng::from_entropy(),
                base: Box::new(base),
            },
        }
    }

    /// Fill the task edges. The task must have been evaluated or proven.
    pub fn generate(&mut self, task: &mut SearchTask) {
        debug_assert!(task.is_ready(), "generating edges for a task that is not ready");
        match self {
            EdgeGenerator::Base {
                max_edges,
                expansion_threshold,
                force_expand_root,
            } => {
                if !task.must_defend() {
                    task.edges_mut().clear();
                    add_empty_cells(task, |_, _| true);
                }
                generate_common(task, *max_edges, *expansion_threshold, *force_expand_root);
            }
            EdgeGenerator::SolverAware {
                max_edges,
                expansion_threshold,
                force_expand_root,
            } => {
                if !task.was_processed_by_solver() || task.edges().is_empty() {
                    task.edges_mut().clear();
                    add_empty_cells(task, |_, _| true);
                }
                generate_common(task, *max_edges, *expansion_threshold, *force_expand_root);
            }
            EdgeGenerator::Balanced {
                balance_depth,
                base,
            } => {
                if task.absolute_depth() < *balance_depth {
                    EdgeGenerator::Base {
                        max_edges: usize::MAX,
                        expansion_threshold: 0.0,
                        force_expand_root: false,
                    }
                    .generate(task);
                } else {
                    base.generate(task);
                }
            }
            EdgeGenerator::CenterExcluding { square_size, base } => {
                let size = *square_size;
                generate_root_filtered(task, base, |rows, cols, row, col| {
                    !is_in_center_square(rows, cols, size, row, col)
                });
            }
            EdgeGenerator::CenterOnly { square_size, base } => {
                let size = *square_size;
                generate_root_filtered(task, base, |rows, cols, row, col| {
                    is_in_center_square(rows, cols, size, row, col)
                });
            }
            EdgeGenerator::SymmetryExcluding { base } => {
                if task.relative_depth() != 0 || task.must_defend() {
                    base.generate(task);
                    return;
                }
                let moves = symmetry_distinct_moves(task);
                task.edges_mut().clear();
                for mv in moves {
                    task.add_edge(mv);
                }
                initialize_edges(task);
                finish(task);
            }
            EdgeGenerator::Noisy {
                noise_weight,
                dirichlet_alpha,
                rng,
                base,
            } => {
                base.generate(task);
                if task.relative_depth() != 0 || *noise_weight <= 0.0 || task.edges().is_empty() {
                    return;
                }
                let noise = dirichlet_noise(task.edges().len(), *dirichlet_alpha, rng);
                let weight = *noise_weight;
                for (edge, n) in task.edges_mut().iter_mut().zip(noise) {
                    edge.set_policy_prior((1.0 - weight) * edge.policy_prior() + weight * n);
                }
                renormalize_policy(task.edges_mut());
            }
        }
    }
}

fn generate_common(
    task: &mut SearchTask,
    max_edges: usize,
    expansion_threshold: f32,
    force_expand_root: bool,
) {
    initialize_edges(task);
    let expand_fully = task.relative_depth() == 0 && force_expand_root;
    if !expand_fully {
        prune_weak_moves(task, max_edges, expansion_threshold);
    }
    finish(task);
}

/// Root-only move filter. Falls back to `base` below the root, or when the
/// filter leaves nothing to play.
fn generate_root_filtered(
    task: &mut SearchTask,
    base: &mut EdgeGenerator,
    filter: impl Fn(usize, usize, usize, usize) -> bool,
) {
    if task.relative_depth() != 0 || task.must_defend() {
        base.generate(task);
        return;
    }
    let (rows, cols) = (task.board().rows(), task.board().cols());
    task.edges_mut().clear();
    add_empty_cells(task, |row, col| filter(rows, cols, row, col));
    if task.edges().is_empty() {
        base.generate(task);
        return;
    }
    initialize_edges(task);
    finish(task);
}

/// Empty cells with one representative per orbit of the symmetries that map
/// the board onto itself.
fn symmetry_distinct_moves(task: &SearchTask) -> Vec<Move> {
    let board = task.board();
    let (rows, cols) = (board.rows(), board.cols());
    let sign = task.sign_to_move();
    let symmetries: Vec<Symmetry> = Symmetry::available(rows, cols)
        .iter()
        .copied()
        .filter(|&s| s != Symmetry::Identity && s.apply_board(board) == *board)
        .collect();

    let mut moves: Vec<Move> = board
        .empty_cells()
        .map(|(row, col)| Move::new(row, col, sign))
        .collect();
    for symmetry in symmetries {
        let mut j = 0;
        while j < moves.len() {
            let image = symmetry.apply_move(moves[j], rows, cols);
            if let Some(offset) = moves[j + 1..].iter().position(|&m| m == image) {
                moves.remove(j + 1 + offset);
            }
            j += 1;
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_core::{Board, Sign};

    fn ready_task(text: &str, sign: Sign) -> SearchTask {
        let board: Board = text.parse().unwrap();
        let mut task = SearchTask::new(board.rows(), board.cols());
        task.set(&board, sign);
        let size = board.size();
        for (i, p) in task.policy_mut().iter_mut().enumerate() {
            *p = (i + 1) as f32 / size as f32;
        }
        task.mark_as_processed_by_network();
        task
    }

    fn base(max_edges: usize, threshold: f32) -> EdgeGenerator {
        EdgeGenerator::Base {
            max_edges,
            expansion_threshold: threshold,
            force_expand_root: false,
        }
    }

    fn prior_sum(task: &SearchTask) -> f32 {
        task.edges().iter().map(|e| e.policy_prior()).sum()
    }

    #[test]
    fn test_renormalize_uniform_when_zero() {
        let mut edges = vec![Edge::default(), Edge::default(), Edge::default(), Edge::default()];
        renormalize_policy(&mut edges);
        assert!(edges.iter().all(|e| (e.policy_prior() - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_base_generates_all_empty_cells() {
        let mut task = ready_task("X__\n_O_\n___", Sign::Cross);
        base(usize::MAX, 0.0).generate(&mut task);
        assert_eq!(task.edges().len(), 7);
        assert!(task.edges().iter().all(|e| e.get_move().sign == Sign::Cross));
        assert!((prior_sum(&task) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_base_prunes_to_max_edges() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        base(3, 0.0).generate(&mut task);
        assert_eq!(task.edges().len(), 3);
        // highest priors are the last cells
        assert_eq!(task.edges()[0].get_move(), Move::new(2, 2, Sign::Cross));
        assert!((prior_sum(&task) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_prune_by_threshold() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        base(4, 0.25).generate(&mut task);
        // top four priors 9,8,7,6 sum to 30; only 9 and 8 reach 7.5
        assert_eq!(task.edges().len(), 2);
        assert!((task.edges()[0].policy_prior() - 9.0 / 17.0).abs() < 1e-5);
    }

    #[test]
    fn test_force_expand_root_skips_pruning() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        EdgeGenerator::Base {
            max_edges: 2,
            expansion_threshold: 0.0,
            force_expand_root: true,
        }
        .generate(&mut task);
        assert_eq!(task.edges().len(), 9);
    }

    #[test]
    fn test_must_defend_keeps_solver_edges() {
        let mut task = ready_task("___\n___\n___", Sign::Circle);
        task.mark_as_processed_by_solver();
        task.set_must_defend(true);
        task.add_edge(Move::new(1, 1, Sign::Circle));
        base(usize::MAX, 0.0).generate(&mut task);
        assert_eq!(task.edges().len(), 1);
        assert!((task.edges()[0].policy_prior() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_proven_task_keeps_best_edges() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        task.action_scores_mut()[4] = Score::win_in(1);
        task.action_scores_mut()[0] = Score::win_in(3);
        task.set_score(Score::win_in(1));
        base(usize::MAX, 0.0).generate(&mut task);
        assert_eq!(task.edges().len(), 1);
        assert_eq!(task.edges()[0].score(), Score::win_in(1));
    }

    #[test]
    fn test_proven_terminal_has_no_edges() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        task.set_score(Score::loss());
        base(usize::MAX, 0.0).generate(&mut task);
        assert!(task.edges().is_empty());
        assert_eq!(task.score(), Score::loss());
    }

    #[test]
    fn test_full_board_becomes_draw() {
        let mut task = ready_task("XO\nOX", Sign::Cross);
        base(usize::MAX, 0.0).generate(&mut task);
        assert!(task.edges().is_empty());
        assert_eq!(task.score(), Score::draw());
    }

    #[test]
    fn test_solver_aware_keeps_supplied_edges() {
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        task.mark_as_processed_by_solver();
        task.add_edge(Move::new(0, 0, Sign::Cross));
        task.add_edge(Move::new(2, 2, Sign::Cross));
        EdgeGenerator::SolverAware {
            max_edges: usize::MAX,
            expansion_threshold: 0.0,
            force_expand_root: false,
        }
        .generate(&mut task);
        assert_eq!(task.edges().len(), 2);
    }

    #[test]
    fn test_balanced_expands_fully_when_shallow() {
        let mut generator = EdgeGenerator::Balanced {
            balance_depth: 3,
            base: Box::new(base(2, 0.0)),
        };
        let mut task = ready_task("X__\n___\n___", Sign::Circle);
        generator.generate(&mut task);
        assert_eq!(task.edges().len(), 8);

        let mut task = ready_task("XO_\nX__\n___", Sign::Circle);
        generator.generate(&mut task);
        assert_eq!(task.edges().len(), 2);
    }

    #[test]
    fn test_center_filters_apply_at_root() {
        let text = "_____\n_____\n_____\n_____\n_____";
        let mut only = EdgeGenerator::CenterOnly {
            square_size: 3,
            base: Box::new(base(usize::MAX, 0.0)),
        };
        let mut task = ready_task(text, Sign::Cross);
        only.generate(&mut task);
        assert_eq!(task.edges().len(), 9);
        assert!(task
            .edges()
            .iter()
            .all(|e| (1..4).contains(&e.get_move().row()) && (1..4).contains(&e.get_move().col())));

        let mut excluding = EdgeGenerator::CenterExcluding {
            square_size: 3,
            base: Box::new(base(usize::MAX, 0.0)),
        };
        let mut task = ready_task(text, Sign::Cross);
        excluding.generate(&mut task);
        assert_eq!(task.edges().len(), 16);
    }

    #[test]
    fn test_symmetry_excluding_on_empty_board() {
        let mut generator = EdgeGenerator::SymmetryExcluding {
            base: Box::new(base(usize::MAX, 0.0)),
        };
        let mut task = ready_task("_____\n_____\n_____\n_____\n_____", Sign::Cross);
        generator.generate(&mut task);
        assert_eq!(task.edges().len(), 6);

        // a lone corner stone only keeps the diagonal mirror
        let mut task = ready_task("X____\n_____\n_____\n_____\n_____", Sign::Circle);
        generator.generate(&mut task);
        assert_eq!(task.edges().len(), 14);
    }

    #[test]
    fn test_noisy_generator_keeps_distribution() {
        let mut generator = EdgeGenerator::Noisy {
            noise_weight: 0.5,
            dirichlet_alpha: 0.3,
            rng: ChaCha20Rng::seed_from_u64(3),
            base: Box::new(base(usize::MAX, 0.0)),
        };
        let mut task = ready_task("___\n___\n___", Sign::Cross);
        generator.generate(&mut task);
        assert_eq!(task.edges().len(), 9);
        assert!((prior_sum(&task) - 1.0).abs() < 1e-4);
    }
}
