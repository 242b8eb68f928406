use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Growth limits for a single regression tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Least-squares CART regression tree stored as a flat node arena (root at 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on `targets`; each leaf's value is `leaf_value(rows in leaf)`
    pub fn fit<F>(features: &Array2<f64>, targets: &[f64], params: &TreeParams, leaf_value: F) -> Self
    where
        F: Fn(&[usize]) -> f64,
    {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..features.nrows()).collect();
        tree.grow(features, targets, params, &leaf_value, indices, 0);
        tree
    }

    fn grow<F>(
        &mut self,
        features: &Array2<f64>,
        targets: &[f64],
        params: &TreeParams,
        leaf_value: &F,
        indices: Vec<usize>,
        depth: usize,
    ) -> usize
    where
        F: Fn(&[usize]) -> f64,
    {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        let split = if depth < params.max_depth && indices.len() >= params.min_samples_split {
            best_split(features, targets, &indices, params.min_samples_leaf)
        } else {
            None
        };

        match split {
            Some(candidate) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| features[[i, candidate.feature]] <= candidate.threshold);

                let left = self.grow(features, targets, params, leaf_value, left_idx, depth + 1);
                let right = self.grow(features, targets, params, leaf_value, right_idx, depth + 1);
                self.nodes[node_id] = Node::Split {
                    feature: candidate.feature,
                    threshold: candidate.threshold,
                    left,
                    right,
                };
            }
            None => {
                self.nodes[node_id] = Node::Leaf { value: leaf_value(&indices) };
            }
        }

        node_id
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut node_id = 0;
        loop {
            match self.nodes.get(node_id) {
                Some(Node::Split { feature, threshold, left, right }) => {
                    let value = row.get(*feature).copied().unwrap_or(0.0);
                    node_id = if value <= *threshold { *left } else { *right };
                }
                Some(Node::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Exhaustive search for the split maximizing squared-error reduction
fn best_split(
    features: &Array2<f64>,
    targets: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let min_leaf = min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let total: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;
    let mut order = indices.to_vec();

    for feature in 0..features.ncols() {
        order.sort_by(|&a, &b| features[[a, feature]].total_cmp(&features[[b, feature]]));

        let mut left_sum = 0.0;
        for pos in 1..n {
            left_sum += targets[order[pos - 1]];
            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            let prev = features[[order[pos - 1], feature]];
            let next = features[[order[pos], feature]];
            if prev >= next {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / pos as f64
                + right_sum * right_sum / (n - pos) as f64;
            let gain = score - parent_score;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: prev + (next - prev) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
