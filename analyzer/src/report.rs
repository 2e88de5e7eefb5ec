//! Search results in printable and serializable form.

use gomoku_core::{Board, Sign};
use mcts::{NodeCacheStats, SearchStats, Tree};
use serde::Serialize;
use std::fmt::{self, Write as _};

#[derive(Debug, Serialize)]
pub struct MoveReport {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub score: String,
    pub win_rate: f32,
    pub draw_rate: f32,
    pub visits: u32,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub rows: usize,
    pub cols: usize,
    pub sign_to_move: Sign,
    pub root_score: String,
    pub root_visits: u32,
    pub node_count: usize,
    pub max_depth: usize,
    pub memory_bytes: usize,
    pub principal_variation: Vec<MoveReport>,
    /// Row-major playout distribution over the board cells.
    pub distribution: Vec<f32>,
    #[serde(skip)]
    pub board: Board,
    #[serde(skip)]
    pub tree_summary: String,
    pub cache: NodeCacheStats,
    pub search: SearchStats,
}

impl Report {
    pub fn collect(
        tree: &Tree,
        stats: SearchStats,
        tree_depth: usize,
        tree_edges: usize,
    ) -> Self {
        let board = tree.base_board();
        let root = tree.root_node();
        let principal_variation = tree
            .get_principal_variation()
            .into_iter()
            .map(|step| MoveReport {
                row: step.mv.row(),
                col: step.mv.col(),
                text: step.mv.text(),
                score: step.score.to_string(),
                win_rate: step.value.win_rate,
                draw_rate: step.value.draw_rate,
                visits: step.visits,
            })
            .collect();

        Self {
            rows: board.rows(),
            cols: board.cols(),
            sign_to_move: tree.sign_to_move(),
            root_score: root.map(|n| n.score().to_string()).unwrap_or_default(),
            root_visits: root.map(|n| n.visits()).unwrap_or(0),
            node_count: tree.node_count(),
            max_depth: tree.max_depth(),
            memory_bytes: tree.memory(),
            board: board.clone(),
            principal_variation,
            distribution: tree.get_playout_distribution(),
            tree_summary: tree.subtree_to_string(tree_depth, tree_edges),
            cache: tree.cache_stats(),
            search: stats,
        }
    }
}

/// Distribution as a grid of percentages, occupied cells shown as stones.
fn render_distribution(board: &Board, distribution: &[f32]) -> String {
    let mut out = String::new();
    for row in 0..board.rows() {
        for col in 0..board.cols() {
            let cell = board.get(row, col);
            if cell != Sign::None {
                let _ = write!(out, "{:>4}", cell.to_char());
            } else {
                let p = distribution.get(board.index(row, col)).copied().unwrap_or(0.0);
                let _ = write!(out, "{:>4.0}", 100.0 * p);
            }
        }
        out.push('\n');
    }
    out
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}x{} board, {} to move",
            self.rows, self.cols, self.sign_to_move
        )?;
        writeln!(
            f,
            "root: {} after {} visits, {} nodes, depth {}",
            self.root_score, self.root_visits, self.node_count, self.max_depth
        )?;

        write!(f, "pv:")?;
        for step in &self.principal_variation {
            write!(f, " {} ({})", step.text, step.score)?;
        }
        writeln!(f)?;

        if let Some(best) = self.principal_variation.first() {
            writeln!(
                f,
                "best move {} : W={:.3} D={:.3} visits={}",
                best.text, best.win_rate, best.draw_rate, best.visits
            )?;
        }

        writeln!(f)?;
        writeln!(f, "playout distribution (%):")?;
        write!(f, "{}", render_distribution(&self.board, &self.distribution))?;

        writeln!(f)?;
        writeln!(f, "{}", self.tree_summary)?;
        writeln!(f, "{}", self.cache)?;
        write!(f, "{}", self.search)
    }
}
