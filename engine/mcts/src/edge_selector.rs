//! Edge selection strategies used while walking down the tree.
//!
//! Every strategy ranks the edges of one node and returns the index of the
//! best. Proven edges are ranked first by outcome so the search never wastes
//! visits on a known loss while a known win is available.

use crate::config::{SearchConfig, SelectorKind};
use crate::edge::Edge;
use crate::node::Node;
use crate::score::ProvenValue;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Gamma};

const PROVEN_WEIGHT: f32 = 1000.0;
const BEST_EDGE_PROVEN_WEIGHT: f32 = 1.0e8;

/// Down-weighting factor for edges that other threads are traversing.
#[inline]
fn virtual_loss_factor(edge: &Edge) -> f32 {
    let visits = 1.0e-8 + edge.visits() as f32;
    visits / (visits + edge.virtual_loss() as f32)
}

/// Rank proven edges, `None` for unproven ones.
#[inline]
fn proven_rank(edge: &Edge, style_factor: f32) -> Option<f32> {
    let distance = edge.score().distance() as f32;
    match edge.score().proven_value() {
        ProvenValue::Loss => Some(-PROVEN_WEIGHT + distance),
        ProvenValue::Draw => Some(style_factor),
        ProvenValue::Win => Some(PROVEN_WEIGHT - distance),
        ProvenValue::Unknown => None,
    }
}

/// Index of the first edge with the strictly highest rank.
fn find_best_edge(node: &Node, mut rank: impl FnMut(usize, &Edge) -> f32) -> usize {
    debug_assert!(!node.is_leaf(), "cannot select an edge of a leaf node");
    let mut best_index = 0;
    let mut best_value = f32::MIN;
    for (index, edge) in node.edges().iter().enumerate() {
        let value = rank(index, edge);
        if value > best_value {
            best_value = value;
            best_index = index;
        }
    }
    best_index
}

fn puct_rank(
    node: &Node,
    exploration_constant: f32,
    style_factor: f32,
) -> impl Fn(&Edge, f32) -> f32 {
    let parent_sqrt_visit = exploration_constant
        * ((node.visits() + node.virtual_loss()) as f32).sqrt();
    let initial_q = node.expectation(style_factor);
    move |edge: &Edge, prior: f32| {
        if let Some(rank) = proven_rank(edge, style_factor) {
            return rank;
        }
        let q = if edge.visits() > 0 {
            edge.expectation(style_factor) * virtual_loss_factor(edge)
        } else {
            initial_q
        };
        let u = prior * parent_sqrt_visit
            / (1.0 + (edge.visits() + edge.virtual_loss()) as f32);
        q + u
    }
}

/// PUCT with root Dirichlet noise. The noisy priors are drawn on the first
/// root visit and kept until [`EdgeSelector::reset`].
#[derive(Debug, Clone)]
pub struct NoisyPuct {
    exploration_constant: f32,
    style_factor: f32,
    noise_weight: f32,
    dirichlet_alpha: f32,
    rng: ChaCha20Rng,
    noisy_policy: Vec<f32>,
}

impl NoisyPuct {
    pub fn new(
        exploration_constant: f32,
        style_factor: f32,
        noise_weight: f32,
        dirichlet_alpha: f32,
        seed: u64,
    ) -> Self {
        Self {
            exploration_constant,
            style_factor,
            noise_weight,
            dirichlet_alpha,
            rng: ChaCha20Rng::seed_from_u64(seed),
            noisy_policy: Vec::new(),
        }
    }

    /// Priors mixed with noise, empty until the root has been visited.
    pub fn noisy_policy(&self) -> &[f32] {
        &self.noisy_policy
    }

    fn select(&mut self, node: &Node) -> usize {
        let use_noise = node.is_root() && self.noise_weight > 0.0;
        if use_noise && self.noisy_policy.len() != node.number_of_edges() {
            let noise = dirichlet_noise(node.number_of_edges(), self.dirichlet_alpha, &mut self.rng);
            self.noisy_policy = node
                .edges()
                .iter()
                .zip(noise)
                .map(|(edge, n)| (1.0 - self.noise_weight) * edge.policy_prior() + self.noise_weight * n)
                .collect();
        }

        let rank = puct_rank(node, self.exploration_constant, self.style_factor);
        if use_noise {
            let policy = &self.noisy_policy;
            find_best_edge(node, |i, edge| rank(edge, policy[i]))
        } else {
            find_best_edge(node, |_, edge| rank(edge, edge.policy_prior()))
        }
    }
}

/// Dirichlet sample from normalised Gamma variates. Falls back to a uniform
/// vector when `alpha` is not a valid shape.
pub(crate) fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    let uniform = vec![1.0 / n.max(1) as f32; n];
    let Ok(gamma) = Gamma::new(alpha as f64, 1.0) else {
        return uniform;
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
        samples
    } else {
        uniform
    }
}

#[derive(Debug, Clone)]
pub enum EdgeSelector {
    Puct {
        exploration_constant: f32,
        style_factor: f32,
    },
    Uct {
        exploration_constant: f32,
        style_factor: f32,
    },
    NoisyPuct(NoisyPuct),
    /// Prefers balanced positions (win rate close to loss rate) for nodes
    /// shallower than `balance_depth` stones, then defers to `base`.
    Balanced {
        balance_depth: usize,
        base: Box<EdgeSelector>,
    },
    MaxValue {
        style_factor: f32,
    },
    MaxVisit,
    /// Final move choice: proven outcome, then visits plus value.
    BestEdge {
        style_factor: f32,
    },
}

impl EdgeSelector {
    pub fn from_config(config: &SearchConfig) -> Self {
        let puct = EdgeSelector::Puct {
            exploration_constant: config.exploration_constant,
            style_factor: config.style_factor,
        };
        match config.selector {
            SelectorKind::Puct => puct,
            SelectorKind::Uct => EdgeSelector::Uct {
                exploration_constant: config.exploration_constant,
                style_factor: config.style_factor,
            },
            SelectorKind::NoisyPuct => EdgeSelector::NoisyPuct(NoisyPuct::new(
                config.exploration_constant,
                config.style_factor,
                config.noise_weight,
                config.dirichlet_alpha,
                rand::random(),
            )),
            SelectorKind::Balanced => EdgeSelector::Balanced {
                balance_depth: config.balance_depth,
                base: Box::new(puct),
            },
        }
    }

    /// Index of the chosen edge.
    ///
    /// # Panics
    /// Debug builds assert the node has edges.
    pub fn select(&mut self, node: &Node) -> usize {
        match self {
            EdgeSelector::Puct {
                exploration_constant,
                style_factor,
            } => {
                let rank = puct_rank(node, *exploration_constant, *style_factor);
                find_best_edge(node, |_, edge| rank(edge, edge.policy_prior()))
            }
            EdgeSelector::Uct {
                exploration_constant,
                style_factor,
            } => select_uct(node, *exploration_constant, *style_factor),
            EdgeSelector::NoisyPuct(noisy) => noisy.select(node),
            EdgeSelector::Balanced {
                balance_depth,
                base,
            } => {
                if node.depth() < *balance_depth {
                    find_best_edge(node, |_, edge| balance_rank(edge))
                } else {
                    base.select(node)
                }
            }
            EdgeSelector::MaxValue { style_factor } => {
                let style = *style_factor;
                find_best_edge(node, |_, edge| {
                    proven_rank(edge, style).unwrap_or_else(|| edge.expectation(style))
                })
            }
            EdgeSelector::MaxVisit => find_best_edge(node, |_, edge| edge.visits() as f32),
            EdgeSelector::BestEdge { style_factor } => {
                let style = *style_factor;
                let parent_visits = node.visits() as f32;
                find_best_edge(node, |_, edge| {
                    let distance = edge.score().distance() as f32;
                    match edge.score().proven_value() {
                        ProvenValue::Loss => -BEST_EDGE_PROVEN_WEIGHT + distance,
                        ProvenValue::Win => BEST_EDGE_PROVEN_WEIGHT - distance,
                        ProvenValue::Draw | ProvenValue::Unknown => {
                            edge.visits() as f32
                                + edge.expectation(style) * parent_visits
                                + 0.001 * edge.policy_prior()
                        }
                    }
                })
            }
        }
    }

    /// Forget per-search state such as cached root noise.
    pub fn reset(&mut self) {
        match self {
            EdgeSelector::NoisyPuct(noisy) => noisy.noisy_policy.clear(),
            EdgeSelector::Balanced { base, .. } => base.reset(),
            _ => {}
        }
    }
}

fn select_uct(node: &Node, exploration_constant: f32, style_factor: f32) -> usize {
    let parent_visits = (node.visits() + node.virtual_loss()).max(1) as f32;
    let parent_log_visit = parent_visits.ln();
    let initial_q = node.expectation(style_factor);
    find_best_edge(node, |_, edge| {
        if let Some(rank) = proven_rank(edge, style_factor) {
            return rank;
        }
        let n = 1.0 + (edge.visits() + edge.virtual_loss()) as f32;
        let q = if edge.visits() > 0 {
            edge.expectation(style_factor)
        } else {
            initial_q
        };
        let u = exploration_constant * (parent_log_visit / n).sqrt();
        let p = edge.policy_prior() / n;
        q * virtual_loss_factor(edge) + u + p
    })
}

fn balance_rank(edge: &Edge) -> f32 {
    match edge.score().proven_value() {
        ProvenValue::Loss | ProvenValue::Win => 0.0,
        ProvenValue::Draw => virtual_loss_factor(edge),
        ProvenValue::Unknown => {
            let value = edge.value();
            (1.0 - (value.win_rate - value.loss_rate()).abs()) * virtual_loss_factor(edge)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Score;
    use crate::value::Value;
    use gomoku_core::{Move, Sign};

    fn node_with_priors(priors: &[f32]) -> Node {
        let mut node = Node::default();
        node.reset(0, Sign::Cross);
        node.create_edges(priors.len());
        for (i, (edge, prior)) in node.edges_mut().iter_mut().zip(priors).enumerate() {
            *edge = Edge::new(Move::new(0, i, Sign::Cross));
            edge.set_policy_prior(*prior);
        }
        node.update_value(Value::new(0.5, 0.0));
        node
    }

    fn puct() -> EdgeSelector {
        EdgeSelector::Puct {
            exploration_constant: 1.25,
            style_factor: 0.5,
        }
    }

    #[test]
    fn test_puct_prefers_prior_when_unvisited() {
        let node = node_with_priors(&[0.1, 0.7, 0.2]);
        assert_eq!(puct().select(&node), 1);
    }

    #[test]
    fn test_puct_prefers_proven_win_and_avoids_loss() {
        let mut node = node_with_priors(&[0.8, 0.1, 0.1]);
        node.edge_mut(0).set_score(Score::loss_in(2));
        node.edge_mut(2).set_score(Score::win_in(5));
        assert_eq!(puct().select(&node), 2);

        node.edge_mut(1).set_score(Score::win_in(3));
        assert_eq!(puct().select(&node), 1);
    }

    #[test]
    fn test_virtual_loss_diverts_selection() {
        let mut node = node_with_priors(&[0.5, 0.5]);
        node.edge_mut(0).update_value(Value::new(0.6, 0.0));
        node.edge_mut(1).update_value(Value::new(0.6, 0.0));
        assert_eq!(puct().select(&node), 0);
        for _ in 0..4 {
            node.edge_mut(0).increase_virtual_loss();
            node.increase_virtual_loss();
        }
        assert_eq!(puct().select(&node), 1);
    }

    #[test]
    fn test_uct_explores_unvisited() {
        let mut node = node_with_priors(&[0.5, 0.5]);
        for _ in 0..10 {
            node.edge_mut(0).update_value(Value::new(0.5, 0.0));
            node.update_value(Value::new(0.5, 0.0));
        }
        let mut uct = EdgeSelector::Uct {
            exploration_constant: 1.0,
            style_factor: 0.5,
        };
        assert_eq!(uct.select(&node), 1);
    }

    #[test]
    fn test_best_edge_and_max_visit() {
        let mut node = node_with_priors(&[0.3, 0.3, 0.4]);
        for _ in 0..3 {
            node.edge_mut(1).update_value(Value::new(0.4, 0.0));
        }
        node.edge_mut(2).update_value(Value::new(0.9, 0.0));
        assert_eq!(EdgeSelector::MaxVisit.select(&node), 1);
        assert_eq!(EdgeSelector::BestEdge { style_factor: 0.5 }.select(&node), 1);

        node.edge_mut(0).set_score(Score::win_in(7));
        assert_eq!(EdgeSelector::BestEdge { style_factor: 0.5 }.select(&node), 0);
    }

    #[test]
    fn test_max_value() {
        let mut node = node_with_priors(&[0.3, 0.3]);
        node.edge_mut(0).update_value(Value::new(0.2, 0.0));
        node.edge_mut(1).update_value(Value::new(0.7, 0.0));
        assert_eq!(EdgeSelector::MaxValue { style_factor: 0.5 }.select(&node), 1);
    }

    #[test]
    fn test_balanced_below_depth() {
        let mut node = node_with_priors(&[0.9, 0.1]);
        node.edge_mut(0).update_value(Value::new(0.9, 0.0));
        node.edge_mut(1).update_value(Value::new(0.5, 0.0));
        let mut balanced = EdgeSelector::Balanced {
            balance_depth: 4,
            base: Box::new(puct()),
        };
        assert_eq!(balanced.select(&node), 1);

        let mut shallow = EdgeSelector::Balanced {
            balance_depth: 0,
            base: Box::new(EdgeSelector::MaxVisit),
        };
        assert_eq!(shallow.select(&node), 0);
    }

    #[test]
    fn test_noisy_puct_caches_noise_until_reset() {
        let mut node = node_with_priors(&[0.25, 0.25, 0.25, 0.25]);
        node.mark_as_root();
        let mut selector = EdgeSelector::NoisyPuct(NoisyPuct::new(1.25, 0.5, 0.25, 0.3, 7));
        selector.select(&node);

        let EdgeSelector::NoisyPuct(noisy) = &selector else {
            unreachable!()
        };
        let first = noisy.noisy_policy().to_vec();
        assert_eq!(first.len(), 4);
        assert!((first.iter().sum::<f32>() - 1.0).abs() < 1e-4);

        selector.select(&node);
        let EdgeSelector::NoisyPuct(noisy) = &selector else {
            unreachable!()
        };
        assert_eq!(noisy.noisy_policy(), first.as_slice());

        selector.reset();
        let EdgeSelector::NoisyPuct(noisy) = &selector else {
            unreachable!()
        };
        assert!(noisy.noisy_policy().is_empty());
    }

    #[test]
    fn test_dirichlet_noise_invalid_alpha_is_uniform() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let noise = dirichlet_noise(4, 0.0, &mut rng);
        assert!(noise.iter().all(|n| (n - 0.25).abs() < 1e-6));
    }
}
