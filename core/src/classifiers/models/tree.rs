//! Squared-error regression trees for gradient boosting
//!
//! Leaves start at the mean target and can be overwritten after fitting,
//! which is how boosting installs its Newton step. Callers need the leaf a
//! sample lands in, so the tree exposes `apply`.

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Growth limits for a single tree
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child variance
    child_impurity: f64,
}

/// A fitted binary regression tree
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    importances: Array1<f64>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `indices`
    pub(crate) fn fit(
        x: ArrayView2<f64>,
        values: &[f64],
        indices: Vec<usize>,
        params: &TreeParams,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut importances = Array1::<f64>::zeros(x.ncols());
        let mut stack = vec![(0usize, indices, 0usize)];

        while let Some((node_id, rows, depth)) = stack.pop() {
            let impurity = variance(values, &rows);
            let can_split = params.max_depth.map_or(true, |d| depth < d)
                && rows.len() >= params.min_samples_split.max(2)
                && rows.len() >= 2 * params.min_samples_leaf.max(1)
                && impurity > 0.0;

            let split = if can_split {
                best_split(x, values, &rows, params.min_samples_leaf.max(1))
            } else {
                None
            };

            match split {
                Some(split) if split.child_impurity < impurity => {
                    let n = rows.len() as f64;
                    importances[split.feature] += n * (impurity - split.child_impurity);

                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .copied()
                        .partition(|&i| x[(i, split.feature)] <= split.threshold);

                    let left = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });
                    let right = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });
                    nodes[node_id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                    };
                    stack.push((right, right_rows, depth + 1));
                    stack.push((left, left_rows, depth + 1));
                }
                _ => {
                    let mean = rows.iter().map(|&i| values[i]).sum::<f64>() / rows.len() as f64;
                    nodes[node_id] = Node::Leaf { value: mean };
                }
            }
        }

        Self { nodes, importances }
    }

    /// Index of the leaf a sample lands in
    pub(crate) fn apply(&self, sample: ArrayView1<f64>) -> usize {
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { .. } => return node,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub(crate) fn predict_one(&self, sample: ArrayView1<f64>) -> f64 {
        match &self.nodes[self.apply(sample)] {
            Node::Leaf { value } => *value,
            Node::Split { .. } => 0.0,
        }
    }

    pub(crate) fn set_leaf_value(&mut self, leaf: usize, value: f64) {
        if let Some(Node::Leaf { value: stored }) = self.nodes.get_mut(leaf) {
            *stored = value;
        }
    }

    /// Unnormalized total variance decrease per feature
    pub(crate) fn raw_importances(&self) -> &Array1<f64> {
        &self.importances
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

fn variance(values: &[f64], rows: &[usize]) -> f64 {
    let n = rows.len() as f64;
    let (sum, sum_sq) = rows
        .iter()
        .fold((0.0, 0.0), |(s, q), &i| (s + values[i], q + values[i] * values[i]));
    (sum_sq - sum * sum / n) / n
}

fn best_split(
    x: ArrayView2<f64>,
    values: &[f64],
    rows: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let mut best: Option<SplitCandidate> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

    for feature in 0..x.ncols() {
        sorted.clear();
        sorted.extend(rows.iter().map(|&i| (x[(i, feature)], i)));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        if sorted[0].0 == sorted[n - 1].0 {
            continue;
        }

        if let Some((position, child_impurity)) = sweep(&sorted, values, min_leaf) {
            let better = best
                .as_ref()
                .map_or(true, |b| child_impurity < b.child_impurity);
            if better {
                let lo = sorted[position - 1].0;
                let hi = sorted[position].0;
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    child_impurity,
                });
            }
        }
    }
    best
}

/// Best split position over sorted rows: `(left size, weighted variance)`
fn sweep(sorted: &[(f64, usize)], values: &[f64], min_leaf: usize) -> Option<(usize, f64)> {
    let n = sorted.len();
    let (total, total_sq) = sorted.iter().fold((0.0, 0.0), |(s, q), &(_, i)| {
        (s + values[i], q + values[i] * values[i])
    });
    let mut sum_left = 0.0;
    let mut sq_left = 0.0;
    let mut best: Option<(usize, f64)> = None;

    for k in 1..n {
        let v = values[sorted[k - 1].1];
        sum_left += v;
        sq_left += v * v;
        if sorted[k - 1].0 == sorted[k].0 || k < min_leaf || n - k < min_leaf {
            continue;
        }
        let nl = k as f64;
        let nr = (n - k) as f64;
        let sum_right = total - sum_left;
        let sq_right = total_sq - sq_left;
        let sse = (sq_left - sum_left * sum_left / nl) + (sq_right - sum_right * sum_right / nr);
        let weighted = sse / n as f64;
        if best.map_or(true, |(_, b)| weighted < b) {
            best = Some((k, weighted));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_tree_respects_depth() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let values = vec![0.0, 1.0, 2.0, 3.0];
        let params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(x.view(), &values, (0..4).collect(), &params);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict_one(x.row(0)), 0.5);
        assert_eq!(tree.predict_one(x.row(3)), 2.5);
    }

    #[test]
    fn test_split_picks_the_informative_feature() {
        let x = array![[0.3, 0.0], [0.1, 0.1], [0.2, 0.9], [0.0, 1.0]];
        let values = vec![-1.0, -1.0, 1.0, 1.0];
        let tree = RegressionTree::fit(x.view(), &values, (0..4).collect(), &TreeParams::default());

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.raw_importances()[0], 0.0);
        // root variance 1.0 over 4 rows, children pure
        assert!((tree.raw_importances()[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_leaf_values_can_be_replaced() {
        let x = array![[0.0], [1.0]];
        let mut tree = RegressionTree::fit(x.view(), &[0.0, 2.0], vec![0, 1], &TreeParams::default());
        let leaf = tree.apply(x.row(1));
        tree.set_leaf_value(leaf, 5.0);
        assert_eq!(tree.predict_one(x.row(1)), 5.0);
        assert_eq!(tree.predict_one(x.row(0)), 0.0);
    }

    #[test]
    fn test_constant_features_give_single_leaf() {
        let x = array![[1.0], [1.0], [1.0]];
        let tree = RegressionTree::fit(x.view(), &[0.0, 1.0, 1.0], (0..3).collect(), &TreeParams::default());
        assert_eq!(tree.n_leaves(), 1);
    }
}
