//! The shared search graph.
//!
//! The tree owns the node cache and the position the search starts from. All
//! selection, expansion and backup goes through here, always under the
//! search lock, so nothing in this module synchronizes on its own.
//!
//! Positions reached by different move orders share one node. Because of
//! that, an edge's statistics can fall behind its child's, which is detected
//! during selection and corrected with [`Tree::correct_information_leak`].

use crate::config::{SearchConfig, TreeConfig};
use crate::edge::Edge;
use crate::edge_generator::EdgeGenerator;
use crate::edge_selector::EdgeSelector;
use crate::node::{compare_edges, Node, NodeId};
use crate::node_cache::{NodeCache, NodeCacheStats};
use crate::score::Score;
use crate::search_task::SearchTask;
use gomoku_core::{Board, Move, Sign};
use std::fmt::Write as _;
use tracing::{debug, trace};

const DEFAULT_BOARD_SIZE: usize = 15;

/// Why selection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The last edge has no expanded child, or the child has no edges.
    ReachedLeaf,
    /// The last edge is already proven, there is nothing to evaluate.
    ReachedProvenEdge,
    /// The last edge disagrees with its child. The path must be corrected
    /// and the task dropped.
    InformationLeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    Success,
    /// The position was already in the cache, reached by another path.
    AlreadyExpanded,
    /// The last edge already pointed at the position.
    SkippedExpansion,
}

/// One step of the principal variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariationStep {
    pub mv: Move,
    pub score: Score,
    pub value: crate::value::Value,
    pub visits: u32,
}

#[derive(Debug)]
pub struct Tree {
    config: TreeConfig,
    cache: NodeCache,
    root: Option<NodeId>,
    base_board: Board,
    sign_to_move: Sign,
    max_depth: usize,
    style_factor: f32,
    selector: EdgeSelector,
    generator: EdgeGenerator,
}

/// The child of an edge, if it is still in the cache.
fn live_child(cache: &NodeCache, node: NodeId, edge: usize) -> Option<NodeId> {
    cache
        .get(node)
        .edge(edge)
        .node()
        .filter(|&child| cache.is_live(child))
}

fn has_leak(cache: &NodeCache, node: NodeId, edge: usize, threshold: f32) -> bool {
    let edge = cache.get(node).edge(edge);
    let Some(child) = edge.node().and_then(|id| cache.try_get(id)) else {
        return false;
    };
    edge.accepts_score(child.score().invert_up())
        || (edge.value() - child.value().inverted()).abs() >= threshold
}

impl Tree {
    pub fn new(config: TreeConfig, search_config: &SearchConfig) -> Self {
        let base_board = Board::new(DEFAULT_BOARD_SIZE, DEFAULT_BOARD_SIZE);
        Self {
            cache: NodeCache::new(
                base_board.rows(),
                base_board.cols(),
                config.initial_cache_size,
                config.node_block_size,
            ),
            config,
            root: None,
            base_board,
            sign_to_move: Sign::Cross,
            max_depth: 0,
            style_factor: search_config.style_factor,
            selector: EdgeSelector::from_config(search_config),
            generator: EdgeGenerator::from_config(search_config),
        }
    }

    pub fn set_edge_selector(&mut self, selector: EdgeSelector) {
        self.selector = selector;
    }

    pub fn set_edge_generator(&mut self, generator: EdgeGenerator) {
        self.generator = generator;
    }

    pub fn edge_generator(&self) -> &EdgeGenerator {
        &self.generator
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn base_board(&self) -> &Board {
        &self.base_board
    }

    pub fn sign_to_move(&self) -> Sign {
        self.sign_to_move
    }

    pub fn node_cache(&self) -> &NodeCache {
        &self.cache
    }

    #[cfg(test)]
    pub(crate) fn node_cache_mut(&mut self) -> &mut NodeCache {
        &mut self.cache
    }

    /// Move the search to a new position, keeping every node that is still
    /// reachable from it. A board of another shape discards the whole cache.
    ///
    /// Must only be called while no task is in flight.
    pub fn set_board(&mut self, board: &Board, sign_to_move: Sign, force_remove_root: bool) {
        if let Some(old_root) = self.root_id() {
            self.cache.get_mut(old_root).unmark_as_root();
        }

        if board.rows() != self.cache.rows() || board.cols() != self.cache.cols() {
            self.cache = NodeCache::new(
                board.rows(),
                board.cols(),
                self.config.initial_cache_size,
                self.config.node_block_size,
            );
        } else {
            self.cleanup(board, sign_to_move);
        }

        self.base_board.clone_from(board);
        self.sign_to_move = sign_to_move;
        if force_remove_root {
            self.cache.remove(board, sign_to_move);
        }
        self.root = self.cache.seek(board, sign_to_move);
        if let Some(root) = self.root {
            self.cache.get_mut(root).mark_as_root();
        }
        self.max_depth = 0;
        self.selector.reset();

        debug!(
            stones = board.move_count(),
            sign = %sign_to_move,
            reused = self.root.is_some(),
            nodes = self.cache.stored_nodes(),
            "tree board set"
        );
    }

    /// Drop every node unreachable from `new_board`.
    pub fn cleanup(&mut self, new_board: &Board, sign_to_move: Sign) {
        self.cache.cleanup(new_board, sign_to_move);
        self.root = self.root.filter(|&id| self.cache.is_live(id));
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.root = None;
        self.max_depth = 0;
        self.selector.reset();
    }

    /// Walk from the root with the configured selector until a leaf, a
    /// proven edge or an information leak. Virtual loss is added to every
    /// node and edge on the way.
    pub fn select(&mut self, task: &mut SearchTask) -> SelectOutcome {
        let selector = &mut self.selector;
        Self::descend(
            &mut self.cache,
            self.root,
            &self.base_board,
            self.sign_to_move,
            self.config.information_leak_threshold,
            &mut self.max_depth,
            task,
            |node| selector.select(node),
        )
    }

    /// Same as [`select`](Self::select) with an explicit edge chooser,
    /// used to replay given lines.
    pub fn select_with(
        &mut self,
        task: &mut SearchTask,
        choose: impl FnMut(&Node) -> usize,
    ) -> SelectOutcome {
        Self::descend(
            &mut self.cache,
            self.root,
            &self.base_board,
            self.sign_to_move,
            self.config.information_leak_threshold,
            &mut self.max_depth,
            task,
            choose,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        cache: &mut NodeCache,
        root: Option<NodeId>,
        base_board: &Board,
        sign_to_move: Sign,
        threshold: f32,
        max_depth: &mut usize,
        task: &mut SearchTask,
        mut choose: impl FnMut(&Node) -> usize,
    ) -> SelectOutcome {
        task.set(base_board, sign_to_move);

        let mut current = root.filter(|&id| cache.is_live(id));
        while let Some(node_id) = current {
            let node = cache.get(node_id);
            if node.is_leaf() {
                break;
            }
            let edge_index = choose(node);
            let mv = node.edge(edge_index).get_move();
            task.append(node_id, edge_index, mv);

            let node = cache.get_mut(node_id);
            node.increase_virtual_loss();
            node.edge_mut(edge_index).increase_virtual_loss();

            let child = match live_child(cache, node_id, edge_index) {
                Some(child) => Some(child),
                None => {
                    // the position may have been expanded through another path
                    let found = cache.timed_seek(task.board(), task.sign_to_move());
                    cache.get_mut(node_id).edge_mut(edge_index).set_node(found);
                    found
                }
            };

            if has_leak(cache, node_id, edge_index, threshold) {
                trace!(node = %node_id, edge = edge_index, "information leak");
                return SelectOutcome::InformationLeak;
            }
            if cache.get(node_id).edge(edge_index).is_proven() {
                return SelectOutcome::ReachedProvenEdge;
            }
            current = child;
        }

        *max_depth = (*max_depth).max(task.visited_path_length());
        SelectOutcome::ReachedLeaf
    }

    /// Fill the task edges with the tree's generator.
    pub fn generate_edges(&mut self, task: &mut SearchTask) {
        self.generator.generate(task);
    }

    /// Store the task leaf as a node and link it to the last edge of the
    /// path, or make it the root when the path is empty.
    pub fn expand(&mut self, task: &mut SearchTask) -> ExpandOutcome {
        if let Some(existing) = self.cache.timed_seek(task.board(), task.sign_to_move()) {
            let Some(pair) = task.last_pair() else {
                return ExpandOutcome::SkippedExpansion;
            };
            let edge = self.cache.get_mut(pair.node).edge_mut(pair.edge);
            if edge.node() == Some(existing) {
                return ExpandOutcome::SkippedExpansion;
            }
            edge.set_node(Some(existing));
            if self.has_information_leak(pair.node, pair.edge) {
                self.correct_information_leak(task);
            }
            return ExpandOutcome::AlreadyExpanded;
        }

        let id = self
            .cache
            .insert(task.board(), task.sign_to_move(), task.edges().len());
        let node = self.cache.get_mut(id);
        for (dst, src) in node.edges_mut().iter_mut().zip(task.edges()) {
            *dst = Edge::from_generated(src);
        }
        node.update_value(task.value());
        if node.is_leaf() {
            node.set_score(task.score());
        } else {
            node.update_score_from_edges();
        }
        node.set_must_defend(task.must_defend());

        match task.last_pair() {
            Some(pair) => self
                .cache
                .get_mut(pair.node)
                .edge_mut(pair.edge)
                .set_node(Some(id)),
            None => {
                node.mark_as_root();
                self.root = Some(id);
            }
        }
        ExpandOutcome::Success
    }

    /// Propagate the task value up its path and recompute proven scores
    /// bottom-up. Releases the virtual loss added during selection.
    pub fn backup(&mut self, task: &SearchTask) {
        let value = task.value();
        for pair in task.visited_path() {
            let node = self.cache.get_mut(pair.node);
            let v = if node.edge(pair.edge).get_move().sign == task.sign_to_move() {
                value
            } else {
                value.inverted()
            };
            node.update_value(v);
            node.decrease_virtual_loss();
            let edge = node.edge_mut(pair.edge);
            edge.update_value(v);
            edge.decrease_virtual_loss();
        }

        for pair in task.visited_path().iter().rev() {
            if let Some(child) = live_child(&self.cache, pair.node, pair.edge) {
                let score = self.cache.get(child).score().invert_up();
                self.cache
                    .get_mut(pair.node)
                    .edge_mut(pair.edge)
                    .update_score(score);
            }
            self.cache.get_mut(pair.node).update_score_from_edges();
        }
    }

    /// Whether an edge's statistics disagree with its child node.
    pub fn has_information_leak(&self, node: NodeId, edge: usize) -> bool {
        has_leak(
            &self.cache,
            node,
            edge,
            self.config.information_leak_threshold,
        )
    }

    /// Pull each leaking edge of the path, deepest first, to the value and
    /// score of its child. A single pseudo-visit moves the edge mean exactly
    /// onto the child's, and the same update keeps the parent consistent.
    pub fn correct_information_leak(&mut self, task: &SearchTask) {
        for pair in task.visited_path().iter().rev() {
            if !self.has_information_leak(pair.node, pair.edge) {
                break;
            }
            let Some(child) = live_child(&self.cache, pair.node, pair.edge) else {
                break;
            };
            let (child_value, child_score) = {
                let child = self.cache.get(child);
                (child.value(), child.score())
            };

            let node = self.cache.get_mut(pair.node);
            let edge = node.edge_mut(pair.edge);
            let target = child_value.inverted();
            let correction = (target - edge.value()) * edge.visits() as f32 + target;
            edge.update_value(correction);
            edge.update_score(child_score.invert_up());
            node.update_value(correction);
            node.update_score_from_edges();
        }
    }

    /// Release the virtual loss of a task that will not be backed up.
    pub fn cancel_virtual_loss(&mut self, task: &SearchTask) {
        for pair in task.visited_path() {
            let node = self.cache.get_mut(pair.node);
            node.decrease_virtual_loss();
            node.edge_mut(pair.edge).decrease_virtual_loss();
        }
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root.filter(|&id| self.cache.is_live(id))
    }

    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|id| self.cache.try_get(id))
    }

    pub fn node_count(&self) -> usize {
        self.cache.stored_nodes()
    }

    pub fn simulation_count(&self) -> u32 {
        self.root_node().map_or(0, Node::visits)
    }

    /// Longest selected path since the board was last set.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_root_proven(&self) -> bool {
        self.root_node().is_some_and(Node::is_proven)
    }

    pub fn has_all_moves_proven(&self) -> bool {
        self.root_node()
            .is_some_and(|root| !root.is_leaf() && root.edges().iter().all(Edge::is_proven))
    }

    pub fn has_single_move(&self) -> bool {
        self.root_node().is_some_and(|root| root.number_of_edges() == 1)
    }

    pub fn has_single_non_losing_move(&self) -> bool {
        self.root_node().is_some_and(|root| {
            root.edges().iter().filter(|e| !e.score().is_loss()).count() == 1
        })
    }

    /// Row-major move distribution at the root.
    ///
    /// With a proven win available the mass is split between the fastest
    /// wins. Otherwise moves are weighted by visits, ignoring proven losses
    /// unless every move loses, and by prior when nothing was visited yet.
    pub fn get_playout_distribution(&self) -> Vec<f32> {
        let cols = self.base_board.cols();
        let mut result = vec![0.0; self.base_board.size()];
        let Some(root) = self.root_node() else {
            return result;
        };
        if root.is_leaf() {
            return result;
        }
        let index = |e: &Edge| e.get_move().row() * cols + e.get_move().col();

        let best = root.edges().iter().map(Edge::score).max().unwrap_or_default();
        if best.is_win() {
            for edge in root.edges().iter().filter(|e| e.score() == best) {
                result[index(edge)] = 1.0;
            }
        } else {
            let all_losing = root.edges().iter().all(|e| e.score().is_loss());
            for edge in root
                .edges()
                .iter()
                .filter(|e| all_losing || !e.score().is_loss())
            {
                result[index(edge)] = edge.visits() as f32;
            }
            if result.iter().sum::<f32>() == 0.0 {
                for edge in root.edges() {
                    result[index(edge)] = edge.policy_prior();
                }
            }
        }

        let sum: f32 = result.iter().sum();
        if sum > 0.0 {
            result.iter_mut().for_each(|p| *p /= sum);
        }
        result
    }

    /// Best line from the root, following the final move choice at every
    /// expanded node.
    pub fn get_principal_variation(&self) -> Vec<VariationStep> {
        let mut selector = EdgeSelector::BestEdge {
            style_factor: self.style_factor,
        };
        let mut result = Vec::new();
        let mut current = self.root_id();
        while let Some(id) = current {
            let node = self.cache.get(id);
            if node.is_leaf() {
                break;
            }
            let index = selector.select(node);
            let edge = node.edge(index);
            result.push(VariationStep {
                mv: edge.get_move(),
                score: edge.score(),
                value: edge.value(),
                visits: edge.visits(),
            });
            current = live_child(&self.cache, id, index);
        }
        result
    }

    /// Copy of the node reached by playing `moves` from the base board.
    pub fn get_info(&self, moves: &[Move]) -> Option<Node> {
        let mut board = self.base_board.clone();
        let mut sign = self.sign_to_move;
        for &mv in moves {
            if !board.is_empty_at(mv.row(), mv.col()) {
                return None;
            }
            board.put_move(mv);
            sign = mv.sign.invert();
        }
        self.cache
            .seek(&board, sign)
            .map(|id| self.cache.get(id).clone())
    }

    /// Text dump of the tree below the root, best edges first.
    pub fn subtree_to_string(&self, max_depth: usize, max_edges: usize) -> String {
        let mut out = String::new();
        if let Some(root) = self.root_id() {
            let _ = writeln!(out, "{}", self.cache.get(root));
            self.write_subtree(&mut out, root, 0, max_depth, max_edges);
        }
        out
    }

    fn write_subtree(
        &self,
        out: &mut String,
        id: NodeId,
        depth: usize,
        max_depth: usize,
        max_edges: usize,
    ) {
        if depth >= max_depth {
            return;
        }
        let node = self.cache.get(id);
        let mut order: Vec<usize> = (0..node.number_of_edges()).collect();
        order.sort_by(|&a, &b| compare_edges(node.edge(b), node.edge(a), self.style_factor));

        for &index in order.iter().take(max_edges) {
            let edge = node.edge(index);
            let _ = writeln!(out, "{}{}", "|   ".repeat(depth), edge);
            if let Some(child) = live_child(&self.cache, id, index) {
                self.write_subtree(out, child, depth + 1, max_depth, max_edges);
            }
        }
    }

    pub fn memory(&self) -> usize {
        self.cache.memory()
    }

    pub fn cache_stats(&self) -> NodeCacheStats {
        self.cache.stats()
    }
}
